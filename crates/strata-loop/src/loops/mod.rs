//! A single loop: its cursors, its layer chain and the mode machine driving them.
//!
//! A loop keeps two cursors. `frame` is where the next input block is recorded;
//! `play_frame` is where the next output block is read from and runs ahead of `frame`
//! by the input and output latency, so what the performer hears lines up with what
//! gets recorded. Everything a loop needs from its track arrives through a
//! [`LoopContext`].

mod modes;
mod project;
mod record;
mod rounding;
mod schedule;
mod switch;
mod undo;

pub use project::{track_copy_frame, ProjectLayer};
pub use switch::SwitchOrigin;

use strata_core::{wrap_frame, EngineConfig, Preset};

use crate::event::{Event, EventId, EventManager, EventType, JumpInfo};
use crate::layer::{LayerId, LayerPool};
use crate::mode::LoopMode;
use crate::state::{LoopState, LoopSummary};
use crate::stream::{InputStream, OutputStream, StreamState};
use crate::sync::SyncListener;

/// Feedback used in place of full feedback while layering with auto feedback
/// reduction enabled.
pub const AUTO_FEEDBACK_LEVEL: u8 = 121;

/// The track state a loop operates on.
pub struct LoopContext<'a> {
    pub track: usize,
    pub pool: &'a mut LayerPool,
    pub events: &'a mut EventManager,
    pub input: &'a mut InputStream,
    pub output: &'a mut OutputStream,
    pub preset: &'a Preset,
    pub config: &'a EngineConfig,
    pub sync: &'a mut dyn SyncListener,
}

impl LoopContext<'_> {
    #[inline]
    pub fn input_latency(&self) -> i64 {
        self.input.latency() as i64
    }

    #[inline]
    pub fn output_latency(&self) -> i64 {
        self.output.latency() as i64
    }

    /// Distance the play cursor runs ahead of the record cursor.
    #[inline]
    pub fn total_latency(&self) -> i64 {
        self.input_latency() + self.output_latency()
    }
}

/// Record-side stutter region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stutter {
    cycle_start: i64,
    cycle_frames: i64,
    /// End of the copies made so far; the next copy goes here.
    record_end: i64,
}

#[derive(Debug, Default)]
pub struct Loop {
    number: usize,
    mode: LoopMode,
    frame: i64,
    play_frame: i64,
    mode_start_frame: i64,
    /// Length of the silent region opened by Insert.
    gap_frames: i64,
    record: Option<LayerId>,
    play: Option<LayerId>,
    /// Record layer being played ahead of the shift that will commit it.
    pre_play: Option<LayerId>,
    redo: Option<LayerId>,
    overdub: bool,
    mute: bool,
    pause: bool,
    recording: bool,
    /// Play side silenced by a jump.
    play_muted: bool,
    /// Play cursor held in place by a jump.
    play_frozen: bool,
    /// Play side repeating `(start, frames)` of the play layer.
    stutter_play: Option<(i64, i64)>,
    stutter: Option<Stutter>,
    /// Layer came from a timing copy and has no audio of its own yet.
    timing_only: bool,
    /// Rehearse is in a recording pass rather than a playback pass.
    rehearse_recording: bool,
    beat_loop: bool,
    beat_cycle: bool,
    beat_sub_cycle: bool,
    restore_state: StreamState,
    return_loop: Option<usize>,
}

impl Loop {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    #[inline]
    pub fn number(&self) -> usize {
        self.number
    }

    #[inline]
    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    /// Record cursor. Negative while the initial latency is being skipped.
    #[inline]
    pub fn frame(&self) -> i64 {
        self.frame
    }

    #[inline]
    pub fn play_frame(&self) -> i64 {
        self.play_frame
    }

    #[inline]
    pub fn mode_start_frame(&self) -> i64 {
        self.mode_start_frame
    }

    #[inline]
    pub fn record_layer(&self) -> Option<LayerId> {
        self.record
    }

    #[inline]
    pub fn play_layer(&self) -> Option<LayerId> {
        self.play
    }

    #[inline]
    pub fn redo_layer(&self) -> Option<LayerId> {
        self.redo
    }

    #[inline]
    pub fn is_overdub(&self) -> bool {
        self.overdub
    }

    #[inline]
    pub fn is_mute(&self) -> bool {
        self.mute
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.pause
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Has no content and is not recording any.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.play.is_none() && self.mode != LoopMode::Record
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.play.is_some() && !self.pause
    }

    #[inline]
    pub fn return_loop(&self) -> Option<usize> {
        self.return_loop
    }

    /// Length of the record layer, which is the loop length as currently being built.
    pub fn frames(&self, pool: &LayerPool) -> i64 {
        self.record.map_or(0, |r| pool[r].frames())
    }

    pub fn cycles(&self, pool: &LayerPool) -> u32 {
        self.record.map_or(0, |r| pool[r].cycles())
    }

    /// Cycle length of the committed loop, falling back to the record layer.
    pub fn cycle_frames(&self, pool: &LayerPool) -> i64 {
        self.play
            .or(self.record)
            .map_or(0, |id| pool[id].cycle_frames())
    }

    /// Mode to fall back to when a recording mode ends.
    fn resting_mode(&self) -> LoopMode {
        if self.mute {
            LoopMode::Mute
        } else if self.overdub {
            LoopMode::Overdub
        } else if self.timing_only {
            LoopMode::Run
        } else {
            LoopMode::Play
        }
    }

    /// Maps a frame onto a loop of `frames`, staying inside the stutter cycle while
    /// stuttering.
    pub fn warp_frame(&self, frame: i64, frames: i64) -> i64 {
        match self.stutter {
            Some(stutter) => stutter.cycle_start,
            None => wrap_frame(frame, frames),
        }
    }

    /// Frees every layer and returns to Reset. Stream settings go back to normal.
    pub fn reset(&mut self, ctx: &mut LoopContext<'_>) {
        self.cut_output(ctx);
        self.free_layers(ctx);
        let number = self.number;
        *self = Loop::new(number);

        for stream in [ctx.input.stream_mut(), ctx.output.stream_mut()] {
            stream.set_reverse(false);
            stream.set_rates(Default::default());
        }
        ctx.sync.loop_reset(ctx.track);
        tracing::debug!(track = ctx.track, loop_number = number, "loop reset");
    }

    fn free_layers(&mut self, ctx: &mut LoopContext<'_>) {
        for id in [self.record, self.play, self.redo].into_iter().flatten() {
            ctx.output.forget_layer(id);
        }
        if let Some(record) = self.record.take() {
            ctx.pool.free(record);
        }
        ctx.pool.free_undo_chain(self.play.take());
        ctx.pool.free_redo_chain(self.redo.take());
        self.pre_play = None;
    }

    /// Fades out whatever the output was playing before the layer under it changes.
    fn cut_output(&self, ctx: &mut LoopContext<'_>) {
        ctx.output.capture_tail(ctx.pool);
        if let Some(last) = ctx.output.last_layer() {
            ctx.output.forget_layer(last);
        }
    }

    /// Logs structural inconsistencies. Never mutates.
    pub fn validate(&self, ctx: &LoopContext<'_>) {
        if ctx.events.is_validation_suppressed() {
            return;
        }
        if self.mode != LoopMode::Reset && !self.mode.is_idle() && self.record.is_none() {
            tracing::error!(loop_number = self.number, mode = %self.mode, "loop has no record layer");
        }
        for id in [self.record, self.play, self.pre_play, self.redo].into_iter().flatten() {
            if !ctx.pool.contains(id) {
                tracing::error!(loop_number = self.number, ?id, "loop refers to a freed layer");
            }
        }
        if let Some(layer) = self.pre_play.or(self.play).and_then(|id| ctx.pool.get(id)) {
            let frames = layer.frames();
            if frames > 0 && !(0..=frames).contains(&self.play_frame) {
                tracing::error!(
                    loop_number = self.number,
                    play_frame = self.play_frame,
                    frames,
                    "play frame outside the layer"
                );
            }
        }
    }

    /// Current state for display. Beat flags are consumed.
    pub fn take_state(&mut self, pool: &LayerPool, output: &OutputStream) -> LoopState {
        let frames = self.frames(pool);
        let cycle_frames = self.cycle_frames(pool);
        let cycle = if cycle_frames > 0 && frames > 0 {
            (wrap_frame(self.frame, frames) / cycle_frames) as u32 + 1
        } else {
            0
        };
        LoopState {
            number: self.number,
            mode: self.mode,
            frame: self.frame,
            play_frame: self.play_frame,
            frames,
            cycle,
            cycles: self.cycles(pool),
            layer_count: pool.undo_depth(self.play),
            redo_count: pool.redo_depth(self.redo),
            overdub: self.overdub,
            mute: self.mute,
            pause: self.pause,
            reverse: output.is_reverse(),
            recording: self.recording,
            speed: output.stream().speed(),
            pitch: output.stream().pitch(),
            beat_loop: core::mem::take(&mut self.beat_loop),
            beat_cycle: core::mem::take(&mut self.beat_cycle),
            beat_sub_cycle: core::mem::take(&mut self.beat_sub_cycle),
            next_loop: None,
            return_loop: self.return_loop,
        }
    }

    pub fn summary(&self, pool: &LayerPool) -> LoopSummary {
        LoopSummary {
            number: self.number,
            frames: self.frames(pool),
            cycles: self.cycles(pool),
            mode: self.mode,
            active: false,
            pending: false,
            mute: self.mute,
        }
    }

    /// Runs one event that has come due.
    pub fn process_event(&mut self, ctx: &mut LoopContext<'_>, event: Event) {
        tracing::trace!(
            loop_number = self.number,
            kind = ?event.kind,
            frame = event.frame,
            at = self.frame,
            "event"
        );
        match event.kind {
            EventType::RecordStart => self.record_start_event(ctx, &event),
            EventType::RecordStop => self.record_stop_event(ctx, &event),
            EventType::RecordStopSub => self.record_stop_sub_event(ctx),
            EventType::Overdub => self.overdub_event(ctx),
            EventType::MultiplyStart => self.multiply_start_event(ctx),
            EventType::MultiplyEnd => self.multiply_end_event(ctx, &event),
            EventType::InsertStart => self.insert_start_event(ctx),
            EventType::InsertEnd => self.insert_end_event(ctx, &event),
            EventType::StutterStart => self.stutter_start_event(ctx),
            EventType::StutterEnd => self.stutter_end_event(ctx),
            EventType::ReplaceStart => self.replace_start_event(ctx, LoopMode::Replace),
            EventType::SubstituteStart => self.replace_start_event(ctx, LoopMode::Substitute),
            EventType::ReplaceEnd | EventType::SubstituteEnd => self.replace_end_event(ctx),
            EventType::Mute => self.mute_event(ctx, &event),
            EventType::Pause => self.pause_event(ctx, &event),
            EventType::RehearseStart => self.rehearse_start_event(ctx),
            EventType::RehearseEnd => self.rehearse_end_event(ctx),
            EventType::Reverse => self.reverse_event(ctx, &event),
            EventType::ReversePlay => self.reverse_play_event(ctx, &event),
            EventType::Speed => self.speed_event(ctx, &event),
            EventType::Pitch => self.pitch_event(ctx, &event),
            EventType::Undo => self.undo(ctx),
            EventType::Redo => self.redo(ctx),
            EventType::Checkpoint => self.checkpoint(ctx),
            EventType::JumpPlay => self.jump_play_event(ctx, &event),
            EventType::Restart => self.restart_event(ctx),
            EventType::Reset => self.reset(ctx),
            EventType::Switch | EventType::Return | EventType::SusReturn | EventType::Track => {
                tracing::error!(kind = ?event.kind, "track event reached a loop");
            }
        }
        self.validate(ctx);
    }

    /// Schedules a play-side jump `total_latency` frames ahead of its parent.
    pub(crate) fn schedule_play_jump(
        ctx: &mut LoopContext<'_>,
        parent: EventId,
        info: JumpInfo,
    ) -> Option<EventId> {
        let (frame, function) = {
            let parent = ctx.events.get(parent)?;
            (parent.frame - ctx.total_latency(), parent.function)
        };
        let jump = Event::new(EventType::JumpPlay, function, frame)
            .jump(info)
            .not_undoable();
        Some(ctx.events.add_child(parent, jump))
    }
}
