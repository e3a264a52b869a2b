//! Routing invoked functions to the current loop.

use super::{Track, TrackCopy};
use crate::event::{Event, EventType};
use crate::function::{Action, Function};

impl Track {
    /// Handles one press or release.
    pub fn invoke(&mut self, action: &Action) {
        if !action.down {
            self.release(action);
            return;
        }
        let function = action.function;
        tracing::debug!(track = self.number, ?function, arg = action.arg, "invoke");

        match function {
            Function::Reset => {
                self.events.clear();
                let (lp, mut ctx) = self.split();
                lp.reset(&mut ctx);
            }
            Function::TrackReset => self.reset_all(),
            Function::Undo => {
                let (lp, mut ctx) = self.split();
                lp.undo(&mut ctx);
                lp.validate(&ctx);
            }
            Function::Redo => {
                let (lp, mut ctx) = self.split();
                lp.redo(&mut ctx);
                lp.validate(&ctx);
            }
            Function::Checkpoint => {
                let (lp, mut ctx) = self.split();
                lp.checkpoint(&mut ctx);
            }
            f if f.is_switch() => self.schedule_switch(action),
            Function::TrackCopySound | Function::TrackCopyTiming | Function::Bounce => {
                tracing::warn!(?function, "needs the engine; ignored by a lone track");
            }
            f => {
                if f.is_stackable() {
                    if let Some(switch) = self.events.find_event_mut(EventType::Switch) {
                        switch.stacked.push(f);
                        tracing::debug!(?f, target = switch.number, "stacked under switch");
                        return;
                    }
                }
                let (lp, mut ctx) = self.split();
                lp.schedule(&mut ctx, action);
            }
        }
    }

    fn release(&mut self, action: &Action) {
        let function = action.function;
        if function.is_switch() {
            self.release_switch();
            return;
        }
        if !function.is_sustain() {
            return;
        }
        let (lp, mut ctx) = self.split();
        lp.release(&mut ctx, action);
    }

    /// Sets the frame of a pending sustained return.
    fn release_switch(&mut self) {
        let Some((at_end, pending)) = self
            .events
            .find_event(EventType::SusReturn)
            .map(|e| (e.argument != 0, e.pending))
        else {
            return;
        };
        if !pending {
            return;
        }
        let lp = &self.loops[self.current];
        let frame = if at_end {
            lp.frames(&self.pool).max(lp.frame())
        } else {
            lp.frame() + self.input.latency() as i64
        };
        self.events.activate_pending(EventType::SusReturn, frame);
        tracing::debug!(track = self.number, frame, at_end, "sustained return released");
    }

    fn schedule_switch(&mut self, action: &Action) {
        let count = self.loops.len();
        let current = self.current;
        let pending = self.events.find_event(EventType::Switch).map(|e| e.number);
        let from = pending.unwrap_or(current);
        let target = match action.function {
            Function::NextLoop => (from + 1) % count,
            Function::PrevLoop => (from + count - 1) % count,
            _ => match usize::try_from(action.arg) {
                Ok(n) if n < count => n,
                _ => {
                    tracing::warn!(track = self.number, arg = action.arg, "no such loop");
                    return;
                }
            },
        };

        if let Some(switch) = self.events.find_event_mut(EventType::Switch) {
            switch.number = target;
            tracing::debug!(track = self.number, target, "pending switch retargeted");
            return;
        }
        if target == current {
            return;
        }

        let (lp, mut ctx) = self.split();
        let at = if lp.is_empty() || lp.mode().is_idle() {
            lp.frame()
        } else {
            let trigger = lp.trigger_frame(&ctx, action);
            lp.quantize_frame(&ctx, ctx.preset.switch_quantize, trigger)
        };
        let trigger = lp.frame();
        ctx.events.add(
            Event::new(EventType::Switch, action.function, at)
                .number(target)
                .quantized(at > trigger)
                .no_latency(action.no_latency),
        );
        tracing::debug!(track = self.number, from = current, target, at, "switch scheduled");
    }

    /// Queues a copy of another track's loop into the current loop.
    pub fn copy_from(&mut self, copy: TrackCopy) {
        let frame = self.loops[self.current].frame();
        let function = if copy.timing_only {
            Function::TrackCopyTiming
        } else {
            Function::TrackCopySound
        };
        self.pending_copy = Some(copy);
        self.events
            .add(Event::new(EventType::Track, function, frame).not_undoable());
    }
}
