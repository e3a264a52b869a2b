//! Multiply, Insert and Stutter: the modes that grow the loop by whole cycles.

use strata_core::{wrap_frame, MultiplyMode};

use super::{Loop, LoopContext, Stutter};
use crate::event::{Event, EventId, EventType, JumpInfo, JumpTarget};
use crate::function::Function;
use crate::mode::LoopMode;

impl Loop {
    /// Start and end of the rounded span for a rounding mode triggered at `trigger`.
    ///
    /// The end is the first cycle boundary, measured from the mode start, at or after
    /// the trigger and at least one cycle in. Normal multiply never ends past the length
    /// the record layer has grown to by the trigger; a clamped end moves the start back
    /// so the span stays whole cycles.
    pub(super) fn rounded_span(&self, ctx: &LoopContext<'_>, trigger: i64) -> (i64, i64) {
        let cycle = self.cycle_frames(ctx.pool);
        let start = self.mode_start_frame.max(0);
        if cycle <= 0 {
            return (start, trigger);
        }
        let span = (((trigger - start).max(0) + cycle - 1) / cycle).max(1) * cycle;
        let end = start + span;
        if self.mode == LoopMode::Multiply && ctx.preset.multiply_mode == MultiplyMode::Normal {
            let recorded = self.record.map_or(0, |record| ctx.pool[record].frames());
            // multiply appends a cycle each time the record cursor reaches the end
            let limit = recorded.max((trigger.max(0) / cycle + 1) * cycle);
            if end > limit {
                return ((limit - span).max(0), limit);
            }
        }
        (start, end)
    }

    /// End frame for a rounding mode triggered at `trigger`.
    pub fn mode_end_frame(&self, ctx: &LoopContext<'_>, trigger: i64) -> i64 {
        self.rounded_span(ctx, trigger).1
    }

    /// Schedules the end of the current rounding mode, or extends a pending one.
    ///
    /// Triggering the mode's function again while its rounded end is pending moves
    /// the end out by another cycle. Unrounded endings take effect at `trigger`.
    pub(super) fn schedule_mode_end(
        &mut self,
        ctx: &mut LoopContext<'_>,
        function: Function,
        trigger: i64,
    ) -> Option<EventId> {
        let kind = match self.mode {
            LoopMode::Multiply => EventType::MultiplyEnd,
            LoopMode::Insert => EventType::InsertEnd,
            LoopMode::Stutter => EventType::StutterEnd,
            _ => return None,
        };
        let unrounded = function.is_unrounded_ending();
        let cycle = self.cycle_frames(ctx.pool);

        if let Some(existing) = ctx.events.find_event(kind) {
            let id = existing.id;
            if unrounded || existing.unrounded {
                return Some(id);
            }
            let children = existing.children.clone();
            if let Some(end) = ctx.events.get_mut(id) {
                end.frame += cycle;
                end.increase += 1;
                tracing::debug!(kind = ?kind, frame = end.frame, increase = end.increase, "mode end extended");
            }
            for child in children {
                if let Some(child) = ctx.events.get_mut(child) {
                    if child.kind == EventType::JumpPlay {
                        child.frame += cycle;
                    }
                }
            }
            return Some(id);
        }

        let end = if unrounded {
            trigger
        } else {
            let (start, end) = self.rounded_span(ctx, trigger);
            if start != self.mode_start_frame.max(0) {
                tracing::debug!(
                    loop_number = self.number,
                    from = self.mode_start_frame,
                    to = start,
                    "multiply start moved back"
                );
                self.mode_start_frame = start;
            }
            end
        };
        let mut event = Event::new(kind, function, end).quantized(end != trigger);
        event.unrounded = unrounded;
        let id = ctx.events.add(event);

        if !unrounded && !ctx.preset.rounding_overdub && end > trigger {
            let stop = Event::new(EventType::RecordStopSub, function, trigger).not_undoable();
            ctx.events.add_child(id, stop);
        }
        let jump = match kind {
            EventType::MultiplyEnd => {
                let recorded = self.record.map_or(0, |record| ctx.pool[record].frames());
                if unrounded || self.mode_start_frame > 0 || end < recorded {
                    // the layer gets trimmed, so playback restarts from what is kept
                    JumpInfo::to(JumpTarget::ModeStart)
                } else {
                    JumpInfo::to(JumpTarget::ModeEnd)
                }
            }
            EventType::InsertEnd => JumpInfo {
                target: JumpTarget::InsertEnd,
                mute: Some(false),
                freeze: Some(false),
                stutter: None,
            },
            _ => JumpInfo {
                target: JumpTarget::InsertEnd,
                stutter: Some(false),
                ..Default::default()
            },
        };
        Loop::schedule_play_jump(ctx, id, jump);
        tracing::debug!(kind = ?kind, trigger, end, unrounded, "mode end scheduled");
        Some(id)
    }

    pub(super) fn multiply_start_event(&mut self, ctx: &mut LoopContext<'_>) {
        let (Some(_), Some(record)) = (self.play, self.record) else {
            tracing::warn!(loop_number = self.number, "multiply on an empty loop");
            return;
        };
        self.mode = LoopMode::Multiply;
        self.mode_start_frame = self.frame.max(0);
        self.recording = true;
        if !ctx.pool[record].is_recording() {
            ctx.pool[record].begin_recording(true);
        }
        tracing::debug!(loop_number = self.number, frame = self.frame, "multiply start");
    }

    /// Appends the next cycle of the play layer to the record layer.
    pub(super) fn multiply_extend(&mut self, ctx: &mut LoopContext<'_>) {
        let (Some(play), Some(record)) = (self.play, self.record) else {
            return;
        };
        let play_frames = ctx.pool[play].frames();
        let cycle = ctx.pool[play].cycle_frames();
        let from = wrap_frame(ctx.pool[record].frames(), play_frames);
        let (source, dest) = ctx.pool.pair_mut(play, record);
        dest.append_cycle(source.audio(), play, from, cycle);
        tracing::trace!(frames = dest.frames(), cycles = dest.cycles(), "multiply cycle added");
    }

    pub(super) fn multiply_end_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let Some(record) = self.record else {
            return;
        };
        if self.mode != LoopMode::Multiply {
            return;
        }
        let end = self.frame;
        let start = self.mode_start_frame.clamp(0, end);
        let span = end - start;
        if span <= 0 {
            tracing::warn!(loop_number = self.number, "multiply ended where it started");
            self.mode = self.resting_mode();
            self.recording = self.overdub;
            return;
        }

        // fade positions refer to the unspliced layer
        if self.overdub {
            ctx.pool[record].suspend_recording();
        } else {
            ctx.pool[record].stop_recording();
        }
        let cycle = self.cycle_frames(ctx.pool);
        let layer = &mut ctx.pool[record];
        if start > 0 || end < layer.frames() {
            layer.splice(start, span);
        }
        let cycles = if event.unrounded || cycle <= 0 {
            1
        } else {
            (span / cycle).max(1) as u32
        };
        layer.set_cycles(cycles);
        self.play_frame = if self.pre_play == Some(record) {
            wrap_frame(self.play_frame - start, span)
        } else {
            // the play jump is still due: the new loop starts here
            wrap_frame(ctx.total_latency(), span)
        };
        self.mode_start_frame = 0;

        self.mode = self.resting_mode();
        self.recording = self.overdub;
        self.frame = 0;
        self.shift(ctx, false);
        ctx.events.rebase(end, end);
        ctx.sync.loop_resize(ctx.track, span, cycles);
        tracing::debug!(loop_number = self.number, frames = span, cycles, "multiply end");
    }

    pub(super) fn insert_start_event(&mut self, ctx: &mut LoopContext<'_>) {
        let (Some(_), Some(record)) = (self.play, self.record) else {
            tracing::warn!(loop_number = self.number, "insert on an empty loop");
            return;
        };
        let cycle = self.cycle_frames(ctx.pool);
        let at = self.frame.clamp(0, ctx.pool[record].frames());
        let layer = &mut ctx.pool[record];
        layer.insert_gap(at, cycle);
        layer.set_cycles(layer.cycles() + 1);
        if !layer.is_recording() {
            layer.begin_recording(true);
        }
        ctx.events.rebase(at + 1, -cycle);

        self.mode = LoopMode::Insert;
        self.mode_start_frame = at;
        self.frame = at;
        self.gap_frames = cycle;
        self.recording = true;
        tracing::debug!(loop_number = self.number, at, "insert start");
    }

    /// Opens another cycle of gap at the end of the inserted region.
    pub(super) fn insert_extend(&mut self, ctx: &mut LoopContext<'_>) {
        let Some(record) = self.record else {
            return;
        };
        let cycle = self.cycle_frames(ctx.pool);
        let at = self.mode_start_frame + self.gap_frames;
        let layer = &mut ctx.pool[record];
        layer.insert_gap(at, cycle);
        layer.set_cycles(layer.cycles() + 1);
        self.gap_frames += cycle;
        ctx.events.rebase(at + 1, -cycle);
    }

    pub(super) fn insert_end_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let Some(record) = self.record else {
            return;
        };
        if self.mode != LoopMode::Insert {
            return;
        }
        let end = self.frame;
        let gap_end = self.mode_start_frame + self.gap_frames;
        if self.overdub {
            ctx.pool[record].suspend_recording();
        } else {
            ctx.pool[record].stop_recording();
        }

        if event.unrounded && end < gap_end {
            let cut = gap_end - end;
            let layer = &mut ctx.pool[record];
            layer.remove(end, cut);
            layer.set_cycles(1);
            if self.pre_play == Some(record) && self.play_frame >= end {
                self.play_frame -= cut;
            }
            ctx.events.rebase(gap_end, cut);
        }

        self.gap_frames = 0;
        self.mode = self.resting_mode();
        self.recording = self.overdub;
        self.shift(ctx, false);
        let frames = self.frames(ctx.pool);
        let cycles = self.cycles(ctx.pool);
        ctx.sync.loop_resize(ctx.track, frames, cycles);
        tracing::debug!(loop_number = self.number, frames, cycles, "insert end");
    }

    pub(super) fn stutter_start_event(&mut self, ctx: &mut LoopContext<'_>) {
        let (Some(_), Some(record)) = (self.play, self.record) else {
            tracing::warn!(loop_number = self.number, "stutter on an empty loop");
            return;
        };
        let cycle = self.cycle_frames(ctx.pool);
        if cycle <= 0 {
            return;
        }
        let frames = ctx.pool[record].frames();
        let cycle_start = (wrap_frame(self.frame, frames) / cycle) * cycle;
        self.stutter = Some(Stutter {
            cycle_start,
            cycle_frames: cycle,
            record_end: cycle_start + cycle,
        });
        self.mode = LoopMode::Stutter;
        self.mode_start_frame = cycle_start;
        self.recording = self.overdub;
        tracing::debug!(loop_number = self.number, cycle_start, "stutter start");
    }

    /// Repeats the stuttered cycle once more in the record layer.
    pub(super) fn stutter_extend(&mut self, ctx: &mut LoopContext<'_>) {
        let (Some(record), Some(stutter)) = (self.record, self.stutter.as_mut()) else {
            return;
        };
        let layer = &mut ctx.pool[record];
        layer.insert_copy(
            stutter.record_end,
            stutter.cycle_start,
            stutter.cycle_frames,
            record,
        );
        layer.set_cycles(layer.cycles() + 1);
        ctx.events.rebase(stutter.record_end + 1, -stutter.cycle_frames);
        stutter.record_end += stutter.cycle_frames;
    }

    pub(super) fn stutter_end_event(&mut self, ctx: &mut LoopContext<'_>) {
        if self.mode != LoopMode::Stutter {
            return;
        }
        self.stutter = None;
        self.mode = self.resting_mode();
        self.recording = self.overdub;
        self.shift(ctx, false);
        let frames = self.frames(ctx.pool);
        let cycles = self.cycles(ctx.pool);
        ctx.sync.loop_resize(ctx.track, frames, cycles);
        tracing::debug!(loop_number = self.number, frames, cycles, "stutter end");
    }
}
