//! User-visible functions and the actions that carry them to a track.

use serde::{Deserialize, Serialize};

/// Something a performer can trigger.
///
/// `SelectLoop`, `Speed*`, `Pitch*` and `TimeStretch` read their value from
/// [`Action::arg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Function {
    Record,
    AutoRecord,
    SusRecord,
    Overdub,
    Multiply,
    SusUnroundedMultiply,
    Insert,
    SusUnroundedInsert,
    Stutter,
    Replace,
    Substitute,
    Mute,
    Pause,
    Rehearse,
    Reverse,
    Forward,
    Backward,
    SpeedOctave,
    SpeedStep,
    SpeedBend,
    PitchOctave,
    PitchStep,
    PitchBend,
    TimeStretch,
    Undo,
    Redo,
    Checkpoint,
    NextLoop,
    PrevLoop,
    SelectLoop,
    Restart,
    Reset,
    TrackReset,
    TrackCopySound,
    TrackCopyTiming,
    Bounce,
}

impl Function {
    /// Scheduled `inputLatency` frames late so the recording lines up with what was heard.
    pub fn is_latency_delayed(self) -> bool {
        use Function::*;
        matches!(
            self,
            Record
                | AutoRecord
                | SusRecord
                | Overdub
                | Multiply
                | SusUnroundedMultiply
                | Insert
                | SusUnroundedInsert
                | Stutter
                | Replace
                | Substitute
                | Mute
                | Pause
                | Rehearse
                | Reverse
                | Forward
                | Backward
                | Restart
                | NextLoop
                | PrevLoop
                | SelectLoop
        )
    }

    /// Waits for the preset's quantize boundary when starting.
    pub fn is_quantized(self) -> bool {
        use Function::*;
        matches!(
            self,
            Multiply
                | SusUnroundedMultiply
                | Insert
                | SusUnroundedInsert
                | Stutter
                | Replace
                | Substitute
                | Mute
                | Reverse
                | Forward
                | Backward
                | Restart
        )
    }

    /// Ends a rounding mode at the trigger frame instead of the next cycle boundary.
    pub fn is_unrounded_ending(self) -> bool {
        use Function::*;
        matches!(
            self,
            Record | AutoRecord | SusRecord | SusUnroundedMultiply | SusUnroundedInsert
        )
    }

    /// Acts on both press and release.
    pub fn is_sustain(self) -> bool {
        use Function::*;
        matches!(self, SusRecord | SusUnroundedMultiply | SusUnroundedInsert)
    }

    pub fn is_switch(self) -> bool {
        matches!(
            self,
            Function::NextLoop | Function::PrevLoop | Function::SelectLoop
        )
    }

    /// May be held under a pending switch and replayed in the next loop.
    pub fn is_stackable(self) -> bool {
        use Function::*;
        matches!(
            self,
            Record | AutoRecord | Overdub | Multiply | Insert | Stutter | Mute | Reverse
        )
    }

    pub fn is_speed(self) -> bool {
        matches!(
            self,
            Function::SpeedOctave | Function::SpeedStep | Function::SpeedBend | Function::TimeStretch
        )
    }

    pub fn is_pitch(self) -> bool {
        matches!(
            self,
            Function::PitchOctave | Function::PitchStep | Function::PitchBend
        )
    }

    pub fn is_record(self) -> bool {
        matches!(
            self,
            Function::Record | Function::AutoRecord | Function::SusRecord
        )
    }
}

/// A function invocation routed to a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action {
    pub function: Function,
    /// Target track, or the selected track when `None`.
    pub track: Option<usize>,
    pub arg: i32,
    /// Press (`true`) or release edge for sustain functions.
    pub down: bool,
    /// Skip the input latency delay, as scripted invocations do.
    pub no_latency: bool,
}

impl Action {
    pub fn new(function: Function) -> Self {
        Self {
            function,
            track: None,
            arg: 0,
            down: true,
            no_latency: false,
        }
    }

    pub fn track(mut self, track: usize) -> Self {
        self.track = Some(track);
        self
    }

    pub fn arg(mut self, arg: i32) -> Self {
        self.arg = arg;
        self
    }

    /// Release edge.
    pub fn up(mut self) -> Self {
        self.down = false;
        self
    }

    pub fn no_latency(mut self) -> Self {
        self.no_latency = true;
        self
    }
}

impl From<Function> for Action {
    fn from(function: Function) -> Self {
        Action::new(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrounded_endings() {
        assert!(Function::Record.is_unrounded_ending());
        assert!(Function::SusUnroundedMultiply.is_unrounded_ending());
        assert!(!Function::Multiply.is_unrounded_ending());
    }

    #[test]
    fn test_immediate_functions() {
        assert!(!Function::Undo.is_latency_delayed());
        assert!(!Function::SpeedStep.is_latency_delayed());
        assert!(Function::Overdub.is_latency_delayed());
    }

    #[test]
    fn test_action_builder() {
        let action = Action::new(Function::SelectLoop).track(1).arg(3).no_latency();
        assert_eq!(action.track, Some(1));
        assert_eq!(action.arg, 3);
        assert!(action.down);
        assert!(action.no_latency);
        assert!(!Action::from(Function::SusRecord).up().down);
    }
}
