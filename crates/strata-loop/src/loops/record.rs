//! The per-block record and play passes, layer shifting and the loop boundary.

use strata_core::{wrap_frame, Preset};

use super::{Loop, LoopContext, AUTO_FEEDBACK_LEVEL};
use crate::event::{Event, EventType};
use crate::function::{Action, Function};
use crate::layer::LayerId;
use crate::mode::LoopMode;

/// Whether `[start, start + frames)` contains a multiple of `unit`.
fn crosses(start: i64, frames: i64, unit: i64) -> bool {
    if unit <= 0 || frames <= 0 {
        return false;
    }
    let next = if start % unit == 0 {
        start
    } else {
        (start / unit + 1) * unit
    };
    next < start + frames
}

impl Loop {
    /// Feedback applied to existing content during the next record pass.
    pub fn effective_feedback(&self, preset: &Preset) -> u8 {
        let feedback = match self.mode {
            LoopMode::Mute => 127,
            LoopMode::Replace => 0,
            mode if preset.alt_feedback_enable
                && self.recording
                && !mode.alt_feedback_disabled() =>
            {
                preset.effective_feedback(true)
            }
            LoopMode::Substitute => 0,
            _ => preset.effective_feedback(false),
        };
        let layering = self.recording
            && matches!(
                self.mode,
                LoopMode::Overdub | LoopMode::Multiply | LoopMode::Stutter
            );
        if feedback >= 127 && layering && preset.auto_feedback_reduction {
            AUTO_FEEDBACK_LEVEL
        } else {
            feedback.min(127)
        }
    }

    /// Writes one block of loop-rate input at the record cursor and advances it.
    pub fn record(&mut self, ctx: &mut LoopContext<'_>, input: &[f32]) {
        let frames = (input.len() / ctx.pool.channels()) as i64;
        if frames == 0 || self.mode.is_idle() {
            return;
        }
        let Some(record) = self.record else {
            tracing::error!(loop_number = self.number, mode = %self.mode, "recording without a record layer");
            return;
        };
        let reverse = ctx.input.is_reverse();
        let feedback = self.effective_feedback(ctx.preset);
        let Some(layer) = ctx.pool.get_mut(record) else {
            tracing::error!(loop_number = self.number, ?record, "recording into a freed layer");
            return;
        };
        if self.pause {
            layer.pause_gap();
            return;
        }
        match self.mode {
            // the gap is already silent
            LoopMode::Insert if !self.recording => {}
            LoopMode::Insert => layer.insert(input, self.frame, reverse),
            _ if self.recording => layer.record(input, self.frame, feedback, reverse),
            _ => layer.advance(self.frame, frames, feedback, reverse),
        }
        self.frame += frames;

        let recorded = layer.frames();
        if self.frame > recorded && !self.mode.extends() {
            tracing::warn!(
                loop_number = self.number,
                frame = self.frame,
                recorded,
                mode = %self.mode,
                "record frame beyond the record layer"
            );
        }
    }

    /// Renders one block at the play cursor and advances it.
    pub fn play(&mut self, ctx: &mut LoopContext<'_>, frames: i64) {
        let mut remaining = frames;
        while remaining > 0 {
            let Some(layer) = self.audible_layer() else {
                ctx.output.play_silence(ctx.pool, remaining as usize);
                return;
            };
            let Some(len) = ctx.pool.get(layer).map(|l| l.frames()) else {
                tracing::error!(loop_number = self.number, ?layer, "playing a freed layer");
                ctx.output.play_silence(ctx.pool, remaining as usize);
                return;
            };
            if len <= 0 {
                ctx.output.play_silence(ctx.pool, remaining as usize);
                return;
            }

            let boundary = self.play_boundary(len);
            let available = boundary - self.play_frame;
            if available < 0 {
                tracing::error!(
                    loop_number = self.number,
                    play_frame = self.play_frame,
                    boundary,
                    "play frame past its boundary, resetting"
                );
                self.reset(ctx);
                ctx.output.play_silence(ctx.pool, remaining as usize);
                return;
            }
            if available == 0 {
                self.next_play_layer(ctx, layer, boundary);
                continue;
            }

            let n = available.min(remaining);
            ctx.output
                .play(ctx.pool, layer, self.play_frame, n as usize, self.play_muted);
            self.notify_beats(ctx, layer, len, n);
            self.play_frame += n;
            remaining -= n;
            if self.play_frame >= boundary {
                self.next_play_layer(ctx, layer, boundary);
            }
        }
    }

    fn audible_layer(&self) -> Option<LayerId> {
        if self.pause || self.play_frozen {
            return None;
        }
        match self.mode {
            LoopMode::Reset | LoopMode::Threshold | LoopMode::Synchronize | LoopMode::Record => None,
            _ => self.pre_play.or(self.play),
        }
    }

    fn play_boundary(&self, len: i64) -> i64 {
        match self.stutter_play {
            Some((start, frames))
                if self.pre_play.is_none() && (start..start + frames).contains(&self.play_frame) =>
            {
                (start + frames).min(len)
            }
            _ => len,
        }
    }

    /// Picks what plays after `current` reached `boundary`.
    fn next_play_layer(&mut self, ctx: &mut LoopContext<'_>, current: LayerId, boundary: i64) {
        if let Some((start, frames)) = self.stutter_play {
            if self.pre_play.is_none() && boundary == start + frames {
                self.play_frame = start;
                return;
            }
        }
        // every case below continues the audio without a seam
        ctx.output.set_layer_shift(true);
        self.play_frame = 0;
        if Some(current) == self.record || self.mode == LoopMode::Multiply {
            return;
        }
        if let Some(record) = self.record {
            self.pre_play = Some(record);
        }
    }

    fn notify_beats(&mut self, ctx: &LoopContext<'_>, layer: LayerId, len: i64, frames: i64) {
        let cycles = ctx.pool.get(layer).map_or(1, |l| l.cycles()).max(1) as i64;
        let cycle = (len / cycles).max(1);
        let sub_cycle = (cycle / ctx.preset.subcycles.max(1) as i64).max(1);
        let start = wrap_frame(self.play_frame - ctx.output_latency(), len);
        self.beat_loop |= crosses(start, frames, len);
        self.beat_cycle |= crosses(start, frames, cycle);
        self.beat_sub_cycle |= crosses(start, frames, sub_cycle);
    }

    /// Commits the record layer onto the undo chain and starts a new one.
    ///
    /// A record layer with nothing worth keeping is squelched: it is reset to a copy of
    /// the play layer and the chain does not grow. With `check_auto_undo`, changes
    /// that stayed under the noise floor count as nothing.
    pub fn shift(&mut self, ctx: &mut LoopContext<'_>, check_auto_undo: bool) {
        let Some(record) = self.record else {
            return;
        };
        if self.mode == LoopMode::Rehearse {
            self.rehearse_shift(ctx);
            return;
        }

        let continuing = self.recording;
        if continuing {
            ctx.pool[record].suspend_recording();
        } else {
            ctx.pool[record].stop_recording();
        }
        let changed = ctx.pool[record].is_changed(ctx.config.noise_floor, check_auto_undo);

        match self.play {
            Some(play) if !changed => {
                let (fade_in, fade_out) = ctx.pool[record].deferred_fades();
                if fade_in || fade_out {
                    ctx.pool[play].set_deferred_fades(fade_in, fade_out);
                }
                if ctx.output.last_layer() == Some(record) {
                    ctx.output.set_last_layer(Some(play), ctx.output.last_frame());
                }
                ctx.pool.copy_into(play, record);
                tracing::trace!(loop_number = self.number, "shift squelched");
            }
            _ => {
                self.commit(ctx, record);
                self.record = Some(ctx.pool.copy(record));
                tracing::debug!(
                    loop_number = self.number,
                    layers = ctx.pool.undo_depth(self.play),
                    frames = ctx.pool[record].frames(),
                    "layer shifted"
                );
            }
        }

        self.pre_play = None;
        if continuing {
            if let Some(record) = self.record {
                ctx.pool[record].begin_recording(false);
            }
        }
    }

    /// Makes `layer` the play layer on top of the undo chain.
    pub(super) fn commit(&mut self, ctx: &mut LoopContext<'_>, layer: LayerId) {
        ctx.pool[layer].set_prev(self.play);
        ctx.pool[layer].reset_changes();
        self.play = Some(layer);
        if self.redo.is_some() {
            ctx.pool.free_redo_chain(self.redo.take());
        }
        if self.timing_only {
            self.timing_only = false;
            if self.mode == LoopMode::Run {
                self.mode = LoopMode::Play;
            }
        }
        self.prune_undo(ctx);
    }

    fn prune_undo(&mut self, ctx: &mut LoopContext<'_>) {
        let max = ctx.config.max_undo;
        if max == 0 {
            return;
        }
        let mut depth = 1;
        let mut next = self.play;
        while let Some(id) = next {
            if depth == max {
                let dropped = ctx.pool[id].prev();
                ctx.pool[id].set_prev(None);
                ctx.pool.free_undo_chain(dropped);
                return;
            }
            depth += 1;
            next = ctx.pool[id].prev();
        }
    }

    /// Where the record cursor next hits a structural boundary, in record frames.
    pub fn next_boundary(&self, ctx: &LoopContext<'_>) -> Option<i64> {
        if self.pause {
            return None;
        }
        match self.mode {
            LoopMode::Reset | LoopMode::Threshold | LoopMode::Synchronize | LoopMode::Record => None,
            LoopMode::Insert => Some(self.mode_start_frame + self.gap_frames),
            LoopMode::Stutter => self.stutter.map(|s| s.record_end),
            _ => Some(self.frames(ctx.pool)).filter(|f| *f > 0),
        }
    }

    /// The record cursor reached [`next_boundary`](Loop::next_boundary).
    pub fn loop_event(&mut self, ctx: &mut LoopContext<'_>) {
        match self.mode {
            LoopMode::Multiply => self.multiply_extend(ctx),
            LoopMode::Insert => self.insert_extend(ctx),
            LoopMode::Stutter => self.stutter_extend(ctx),
            LoopMode::Reset | LoopMode::Threshold | LoopMode::Synchronize | LoopMode::Record => {}
            _ => {
                let frames = self.frames(ctx.pool);
                self.shift(ctx, true);
                self.frame -= frames;
                ctx.events.rebase(frames, frames);
                ctx.sync.loop_local_start_point(ctx.track);
            }
        }
    }

    pub(super) fn record_start_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        // a threshold start is already aligned with the input that crossed it
        let delayed = matches!(self.mode, LoopMode::Reset | LoopMode::Synchronize);
        if !self.mode.is_idle() {
            self.close_recording(ctx);
            if let Some(record) = self.record {
                if self.play.is_some() && ctx.pool[record].is_changed(ctx.config.noise_floor, false) {
                    self.shift(ctx, false);
                }
            }
        }
        if let Some(record) = self.record.take() {
            ctx.output.forget_layer(record);
            ctx.pool.free(record);
        }

        let record = ctx.pool.alloc();
        ctx.pool[record].mark_structure_changed();
        // loop edges stay unfaded so the seam is continuous
        ctx.pool[record].begin_recording(false);
        self.record = Some(record);
        self.pre_play = None;
        self.stutter = None;
        self.stutter_play = None;
        self.timing_only = false;
        self.overdub = false;
        self.mode = LoopMode::Record;
        self.recording = true;
        self.mode_start_frame = 0;
        self.play_frame = 0;
        self.frame = if delayed && event.function.is_latency_delayed() && !event.no_latency {
            -ctx.input_latency()
        } else {
            0
        };

        if event.function == Function::AutoRecord {
            let frames = ctx.preset.auto_record_frames(ctx.config.sample_rate) as i64;
            let stop = Event::new(EventType::RecordStop, Function::AutoRecord, frames).not_undoable();
            ctx.events.add(stop);
        }
        ctx.sync.loop_record_start(ctx.track);
        tracing::debug!(track = ctx.track, loop_number = self.number, frame = self.frame, "record start");
    }

    pub(super) fn record_stop_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        if self.mode != LoopMode::Record {
            tracing::warn!(loop_number = self.number, mode = %self.mode, "record stop outside Record");
            return;
        }
        let Some(record) = self.record else {
            return;
        };
        let frames = self.frame.min(ctx.pool[record].frames());
        if frames <= 0 {
            tracing::warn!(loop_number = self.number, "empty recording discarded");
            self.reset(ctx);
            return;
        }

        let cycles = if event.function == Function::AutoRecord {
            ctx.preset.auto_record_bars * (event.increase + 1)
        } else {
            1
        };
        let layer = &mut ctx.pool[record];
        if layer.frames() > frames {
            layer.truncate(frames);
        }
        layer.set_cycles(cycles.max(1));
        layer.suspend_recording();

        self.recording = false;
        self.mode = LoopMode::Play;
        self.shift(ctx, false);
        self.frame = 0;
        self.play_frame = wrap_frame(ctx.total_latency(), frames);
        ctx.events.rebase(frames, frames);
        ctx.sync.loop_record_stop(ctx.track, frames);
        ctx.sync.loop_resize(ctx.track, frames, cycles);
        tracing::debug!(track = ctx.track, loop_number = self.number, frames, cycles, "record stop");

        if let Some(ending) = event.ending {
            self.schedule(ctx, &Action::new(ending).no_latency());
        }
    }

    /// Stops recording ahead of a rounded ending, leaving the mode in place.
    pub(super) fn record_stop_sub_event(&mut self, ctx: &mut LoopContext<'_>) {
        self.recording = false;
        if let Some(record) = self.record {
            ctx.pool[record].stop_recording();
        }
    }

    /// Closes the open recording region, fading its edge, and leaves the mode.
    pub(super) fn close_recording(&mut self, ctx: &mut LoopContext<'_>) {
        if let Some(record) = self.record {
            ctx.pool[record].stop_recording();
        }
        self.recording = false;
    }
}
