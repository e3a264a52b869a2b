//! Frame-stamped events that drive loop mode transitions.

mod manager;

pub use manager::EventManager;

use smallvec::SmallVec;

use crate::function::Function;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EventId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    RecordStart,
    RecordStop,
    Overdub,
    MultiplyStart,
    MultiplyEnd,
    InsertStart,
    InsertEnd,
    StutterStart,
    StutterEnd,
    ReplaceStart,
    ReplaceEnd,
    SubstituteStart,
    SubstituteEnd,
    Mute,
    Pause,
    RehearseStart,
    RehearseEnd,
    Reverse,
    ReversePlay,
    Speed,
    Pitch,
    Undo,
    Redo,
    Checkpoint,
    Switch,
    Return,
    SusReturn,
    JumpPlay,
    /// Stops recording ahead of a rounded mode end.
    RecordStopSub,
    Restart,
    Reset,
    /// Track copy into the current loop.
    Track,
}

impl EventType {
    /// Ends a rounding mode.
    pub fn is_mode_end(self) -> bool {
        matches!(
            self,
            EventType::MultiplyEnd | EventType::InsertEnd | EventType::StutterEnd
        )
    }

    /// Acts on the play cursor, ahead of the record side by the total latency.
    pub fn is_play_side(self) -> bool {
        matches!(self, EventType::JumpPlay | EventType::ReversePlay)
    }
}

/// Where a play jump lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumpTarget {
    /// Stay where playback is.
    #[default]
    Current,
    /// Absolute frame in the layer being played.
    Frame(i64),
    /// Pre-play the record layer from the loop's mode start frame.
    ModeStart,
    /// Pre-play the record layer from where the rounded mode ends, the remainder
    /// left after an untrimmed multiply.
    ModeEnd,
    /// Pre-play the record layer from just after the region being inserted or
    /// stuttered.
    InsertEnd,
}

/// What a play jump changes besides position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JumpInfo {
    pub target: JumpTarget,
    pub mute: Option<bool>,
    /// Hold the play cursor in place (insert and pause).
    pub freeze: Option<bool>,
    pub stutter: Option<bool>,
}

impl JumpInfo {
    pub fn to(target: JumpTarget) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    pub fn mute(mute: bool) -> Self {
        Self {
            mute: Some(mute),
            ..Default::default()
        }
    }
}

/// A scheduled action on a loop.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub kind: EventType,
    pub function: Function,
    pub frame: i64,
    /// Frame not known yet; released by a threshold crossing or a sync pulse.
    pub pending: bool,
    pub quantized: bool,
    pub parent: Option<EventId>,
    pub children: SmallVec<[EventId; 2]>,
    /// Times the event was extended by re-triggering its function.
    pub increase: u32,
    /// Loop index for switch and return events.
    pub number: usize,
    pub argument: i32,
    pub unrounded: bool,
    /// Function that ended a recording and should start next.
    pub ending: Option<Function>,
    pub jump: JumpInfo,
    /// Functions held under a switch, replayed in the new loop.
    pub stacked: SmallVec<[Function; 4]>,
    /// Can be removed again by Undo before it runs.
    pub undoable: bool,
    /// Triggered without latency compensation.
    pub no_latency: bool,
}

impl Event {
    pub fn new(kind: EventType, function: Function, frame: i64) -> Self {
        Self {
            id: EventId::default(),
            kind,
            function,
            frame,
            pending: false,
            quantized: false,
            parent: None,
            children: SmallVec::new(),
            increase: 0,
            number: 0,
            argument: 0,
            unrounded: false,
            ending: None,
            jump: JumpInfo::default(),
            stacked: SmallVec::new(),
            undoable: true,
            no_latency: false,
        }
    }

    pub fn pending(mut self) -> Self {
        self.pending = true;
        self
    }

    pub fn quantized(mut self, quantized: bool) -> Self {
        self.quantized = quantized;
        self
    }

    pub fn number(mut self, number: usize) -> Self {
        self.number = number;
        self
    }

    pub fn argument(mut self, argument: i32) -> Self {
        self.argument = argument;
        self
    }

    pub fn jump(mut self, jump: JumpInfo) -> Self {
        self.jump = jump;
        self
    }

    pub fn not_undoable(mut self) -> Self {
        self.undoable = false;
        self
    }

    pub fn no_latency(mut self, no_latency: bool) -> Self {
        self.no_latency = no_latency;
        self
    }

    pub fn ending(mut self, ending: Function) -> Self {
        self.ending = Some(ending);
        self
    }
}
