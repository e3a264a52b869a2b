//! Undo, redo and checkpoints.
//!
//! Undo peels off the most recent thing first: a pending AutoRecord extension, a
//! pending loop switch, a scheduled event, an uncommitted pass, and finally committed
//! layers.

use strata_core::wrap_frame;

use super::{Loop, LoopContext};
use crate::event::EventType;
use crate::function::Function;
use crate::mode::LoopMode;

impl Loop {
    pub fn undo(&mut self, ctx: &mut LoopContext<'_>) {
        if self.mode == LoopMode::Record && self.shrink_auto_record(ctx) {
            return;
        }
        for kind in [EventType::Switch, EventType::Return, EventType::SusReturn] {
            if let Some(id) = ctx.events.find_event(kind).map(|e| e.id) {
                ctx.events.remove_event(id);
                tracing::debug!(kind = ?kind, "pending switch undone");
                return;
            }
        }
        if let Some(event) = ctx.events.undo_last_event() {
            if event.kind == EventType::RecordStart && self.mode.is_idle() {
                self.mode = LoopMode::Reset;
            }
            return;
        }
        self.undo_layer(ctx);
    }

    /// Takes back one AutoRecord extension.
    fn shrink_auto_record(&mut self, ctx: &mut LoopContext<'_>) -> bool {
        let unit = ctx.preset.auto_record_frames(ctx.config.sample_rate) as i64;
        match ctx.events.find_event_mut(EventType::RecordStop) {
            Some(stop) if stop.function == Function::AutoRecord && stop.increase > 0 => {
                stop.frame -= unit;
                stop.increase -= 1;
                tracing::debug!(frame = stop.frame, "auto record shortened");
                true
            }
            _ => false,
        }
    }

    fn undo_layer(&mut self, ctx: &mut LoopContext<'_>) {
        match self.mode {
            LoopMode::Reset | LoopMode::Threshold | LoopMode::Synchronize => return,
            LoopMode::Record => {
                self.abandon_recording(ctx);
                return;
            }
            LoopMode::Multiply
            | LoopMode::Insert
            | LoopMode::Stutter
            | LoopMode::Replace
            | LoopMode::Substitute
            | LoopMode::Rehearse => {
                self.cancel_mode(ctx);
                return;
            }
            _ => {}
        }
        let (Some(record), Some(_)) = (self.record, self.play) else {
            return;
        };

        if ctx.pool[record].is_changed(ctx.config.noise_floor, false) {
            self.cut_output(ctx);
            self.restore_record(ctx);
            tracing::debug!(loop_number = self.number, "pass undone");
            return;
        }

        let mut popped = 0;
        while let Some(play) = self.play {
            let Some(prev) = ctx.pool[play].prev() else {
                break;
            };
            ctx.pool[play].set_redo(self.redo);
            self.redo = Some(play);
            self.play = Some(prev);
            popped += 1;
            if !ctx.preset.undo_checkpoints
                || ctx.pool[prev].is_checkpoint()
                || !self.checkpoint_below(ctx, prev)
            {
                break;
            }
        }
        if popped == 0 {
            tracing::debug!(loop_number = self.number, "nothing to undo");
            return;
        }
        self.prune_redo(ctx);
        self.cut_output(ctx);
        self.restore_record(ctx);
        tracing::debug!(
            loop_number = self.number,
            popped,
            layers = ctx.pool.undo_depth(self.play),
            "layer undone"
        );
    }

    fn checkpoint_below(&self, ctx: &LoopContext<'_>, from: crate::layer::LayerId) -> bool {
        let mut next = ctx.pool[from].prev();
        while let Some(id) = next {
            if ctx.pool[id].is_checkpoint() {
                return true;
            }
            next = ctx.pool[id].prev();
        }
        false
    }

    fn prune_redo(&mut self, ctx: &mut LoopContext<'_>) {
        let max = ctx.config.max_redo;
        if max == 0 {
            ctx.pool.free_redo_chain(self.redo.take());
            return;
        }
        let mut depth = 1;
        let mut next = self.redo;
        while let Some(id) = next {
            if depth == max {
                let dropped = ctx.pool[id].redo();
                ctx.pool[id].set_redo(None);
                ctx.pool.free_redo_chain(dropped);
                return;
            }
            depth += 1;
            next = ctx.pool[id].redo();
        }
    }

    /// Record layer becomes a fresh copy of the play layer; cursors are warped onto it.
    fn restore_record(&mut self, ctx: &mut LoopContext<'_>) {
        let Some(play) = self.play else {
            return;
        };
        match self.record {
            Some(record) => ctx.pool.copy_into(play, record),
            None => self.record = Some(ctx.pool.copy(play)),
        }
        if self.recording {
            if let Some(record) = self.record {
                ctx.pool[record].begin_recording(true);
            }
        }
        self.pre_play = None;
        let frames = ctx.pool[play].frames();
        self.frame = self.warp_frame(self.frame, frames);
        self.play_frame = wrap_frame(self.frame + ctx.total_latency(), frames);
        ctx.sync.loop_resize(ctx.track, frames, ctx.pool[play].cycles());
    }

    /// Undo while recording: back to what played before, or to Reset.
    fn abandon_recording(&mut self, ctx: &mut LoopContext<'_>) {
        ctx.events.remove_kind(EventType::RecordStop);
        if self.play.is_none() {
            self.reset(ctx);
            return;
        }
        self.recording = false;
        self.mode = self.resting_mode();
        self.restore_record(ctx);
        tracing::debug!(loop_number = self.number, "recording abandoned");
    }

    /// Undo inside a recording mode: drop everything the mode did.
    fn cancel_mode(&mut self, ctx: &mut LoopContext<'_>) {
        for kind in [
            EventType::MultiplyEnd,
            EventType::InsertEnd,
            EventType::StutterEnd,
            EventType::ReplaceEnd,
            EventType::SubstituteEnd,
            EventType::RehearseEnd,
        ] {
            ctx.events.remove_kind(kind);
        }
        self.cut_output(ctx);
        self.stutter = None;
        self.stutter_play = None;
        self.play_muted = self.mute;
        self.play_frozen = false;
        self.gap_frames = 0;
        self.rehearse_recording = false;
        self.overdub = false;
        self.recording = false;
        self.mode = self.resting_mode();
        if let Some(record) = self.record {
            ctx.pool[record].suspend_recording();
        }
        self.restore_record(ctx);
        tracing::debug!(loop_number = self.number, "mode undone");
    }

    pub fn redo(&mut self, ctx: &mut LoopContext<'_>) {
        let Some(redo) = self.redo else {
            tracing::debug!(loop_number = self.number, "nothing to redo");
            return;
        };
        if !matches!(
            self.mode,
            LoopMode::Play | LoopMode::Overdub | LoopMode::Mute | LoopMode::Run
        ) {
            return;
        }
        self.redo = ctx.pool[redo].redo();
        ctx.pool[redo].set_redo(None);
        ctx.pool[redo].set_prev(self.play);
        self.play = Some(redo);
        self.cut_output(ctx);
        self.restore_record(ctx);
        tracing::debug!(loop_number = self.number, layers = ctx.pool.undo_depth(self.play), "layer redone");
    }

    /// Marks the current content as an undo group boundary.
    pub fn checkpoint(&mut self, ctx: &mut LoopContext<'_>) {
        if let Some(record) = self.record {
            if self.play.is_some() && ctx.pool[record].is_changed(ctx.config.noise_floor, false) {
                self.shift(ctx, false);
            }
        }
        if let Some(play) = self.play {
            ctx.pool[play].set_checkpoint(true);
            tracing::debug!(loop_number = self.number, "checkpoint");
        }
    }
}
