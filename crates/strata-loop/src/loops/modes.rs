//! Overdub, Replace, Mute, Pause, Rehearse, direction and rate changes, play jumps.

use strata_core::{reverse_frame, wrap_frame, MuteMode};

use super::{Loop, LoopContext};
use crate::event::{Event, JumpTarget};
use crate::function::Function;
use crate::mode::LoopMode;
use crate::stream::BEND_RANGE;

const OCTAVE_RANGE: i32 = 4;

impl Loop {
    /// Opens or closes the recording region of the record layer.
    pub(super) fn set_recording(&mut self, ctx: &mut LoopContext<'_>, on: bool) {
        let Some(record) = self.record else {
            return;
        };
        let layer = &mut ctx.pool[record];
        if on {
            if !layer.is_recording() {
                layer.begin_recording(true);
            }
        } else {
            layer.stop_recording();
        }
        self.recording = on;
    }

    pub(super) fn overdub_event(&mut self, ctx: &mut LoopContext<'_>) {
        if self.mode.is_idle() || self.record.is_none() {
            return;
        }
        self.overdub = !self.overdub;
        match self.mode {
            LoopMode::Play | LoopMode::Run | LoopMode::Overdub => {
                self.mode = self.resting_mode();
                self.set_recording(ctx, self.overdub);
            }
            LoopMode::Stutter => self.set_recording(ctx, self.overdub),
            // the flag takes effect when the current mode ends
            _ => {}
        }
        tracing::debug!(loop_number = self.number, overdub = self.overdub, "overdub");
    }

    pub(super) fn replace_start_event(&mut self, ctx: &mut LoopContext<'_>, mode: LoopMode) {
        if self.play.is_none() {
            return;
        }
        self.mode = mode;
        self.set_recording(ctx, true);
        tracing::debug!(loop_number = self.number, mode = %mode, "replace start");
    }

    pub(super) fn replace_end_event(&mut self, ctx: &mut LoopContext<'_>) {
        if !self.mode.is_replacing() {
            return;
        }
        self.mode = self.resting_mode();
        self.set_recording(ctx, self.overdub);
    }

    /// `argument` is the new mute state.
    pub(super) fn mute_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let mute = event.argument != 0;
        if mute == self.mute || self.mode.is_idle() {
            return;
        }
        self.mute = mute;
        if ctx.preset.mute_mode == MuteMode::Pause {
            self.pause = mute;
            if let (true, Some(record)) = (mute, self.record) {
                ctx.pool[record].pause_gap();
            }
        }

        if mute {
            if matches!(self.mode, LoopMode::Play | LoopMode::Overdub | LoopMode::Run) {
                self.mode = LoopMode::Mute;
                self.set_recording(ctx, false);
            }
        } else {
            if self.mode == LoopMode::Mute {
                self.mode = self.resting_mode();
                self.set_recording(ctx, self.overdub);
            }
            if ctx.preset.mute_mode == MuteMode::Start {
                // the play side already jumped to the start
                let frames = self.frames(ctx.pool);
                let old = self.frame;
                self.frame = wrap_frame(self.play_frame - ctx.total_latency(), frames);
                ctx.events.offset(self.frame - old);
            }
        }
        tracing::debug!(loop_number = self.number, mute, "mute");
    }

    /// `argument` is the new pause state.
    pub(super) fn pause_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let pause = event.argument != 0;
        if pause == self.pause || self.mode.is_idle() {
            return;
        }
        if let (true, Some(record)) = (pause, self.record) {
            ctx.pool[record].pause_gap();
        }
        self.pause = pause;
        tracing::debug!(loop_number = self.number, pause, "pause");
    }

    pub(super) fn rehearse_start_event(&mut self, ctx: &mut LoopContext<'_>) {
        let Some(record) = self.record else {
            return;
        };
        if self.play.is_none() {
            return;
        }
        self.close_recording(ctx);
        if ctx.pool[record].is_changed(ctx.config.noise_floor, false) {
            self.shift(ctx, false);
        }
        self.mode = LoopMode::Rehearse;
        self.rehearse_recording = false;
        tracing::debug!(loop_number = self.number, "rehearse start");
    }

    /// Loop boundary in Rehearse: alternate between hearing the take and recording
    /// the next one.
    pub(super) fn rehearse_shift(&mut self, ctx: &mut LoopContext<'_>) {
        let Some(record) = self.record else {
            return;
        };
        if self.rehearse_recording {
            // the take just recorded becomes the loop
            ctx.pool[record].suspend_recording();
            if ctx.preset.undoable_rehearse {
                self.commit(ctx, record);
            } else {
                let old = self.play;
                let below = old.and_then(|p| ctx.pool[p].prev());
                ctx.pool[record].set_prev(below);
                ctx.pool[record].reset_changes();
                if let Some(old) = old {
                    ctx.output.forget_layer(old);
                    ctx.pool.free(old);
                }
                self.play = Some(record);
            }
            self.record = Some(ctx.pool.copy(record));
            self.rehearse_recording = false;
            self.recording = false;
        } else {
            let layer = &mut ctx.pool[record];
            layer.zero();
            layer.begin_recording(false);
            self.rehearse_recording = true;
            self.recording = true;
        }
        self.pre_play = None;
        tracing::trace!(loop_number = self.number, recording = self.rehearse_recording, "rehearse pass");
    }

    /// Keeps the take that was last heard.
    pub(super) fn rehearse_end_event(&mut self, ctx: &mut LoopContext<'_>) {
        if self.mode != LoopMode::Rehearse {
            return;
        }
        if let (true, Some(record), Some(play)) = (self.rehearse_recording, self.record, self.play) {
            ctx.pool[record].suspend_recording();
            ctx.pool.copy_into(play, record);
        }
        self.rehearse_recording = false;
        self.recording = false;
        self.mode = self.resting_mode();
        tracing::debug!(loop_number = self.number, "rehearse end");
    }

    /// Record side of a direction change. `argument` is the new direction.
    pub(super) fn reverse_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let reverse = event.argument != 0;
        if reverse == ctx.input.is_reverse() {
            tracing::warn!(loop_number = self.number, reverse, "redundant reverse");
            return;
        }
        ctx.input.stream_mut().set_reverse(reverse);
        let frames = self.frames(ctx.pool);
        if frames > 0 && !self.mode.is_idle() && self.mode != LoopMode::Record {
            let old = self.frame;
            self.frame = reverse_frame(old, frames);
            ctx.events.offset(self.frame - old);
        }
        tracing::debug!(loop_number = self.number, reverse, frame = self.frame, "reverse");
    }

    /// Play side of a direction change, ahead of the record side by the latency.
    pub(super) fn reverse_play_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let reverse = event.argument != 0;
        if reverse == ctx.output.is_reverse() {
            return;
        }
        let loss = (self.frame - event.frame).max(0);
        ctx.output.stream_mut().set_reverse(reverse);
        if let Some(layer) = self.pre_play.or(self.play) {
            let frames = ctx.pool[layer].frames();
            if frames > 0 {
                // reflect where playback was when the event was due, then make up the loss
                let cursor = self.play_frame - loss;
                self.play_frame = wrap_frame(reverse_frame(cursor, frames) + loss, frames);
            }
        }
    }

    /// `argument` is the new value of the control named by the event's function.
    pub(super) fn speed_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let arg = event.argument;
        let step_range = ctx.preset.speed_step_range;
        for stream in [ctx.input.stream_mut(), ctx.output.stream_mut()] {
            let rates = stream.rates();
            match event.function {
                Function::SpeedOctave => stream.set_speed(
                    arg.clamp(-OCTAVE_RANGE, OCTAVE_RANGE),
                    rates.speed_step,
                    rates.speed_bend,
                ),
                Function::SpeedStep => stream.set_speed(
                    rates.speed_octave,
                    arg.clamp(-step_range, step_range),
                    rates.speed_bend,
                ),
                Function::SpeedBend => stream.set_speed(
                    rates.speed_octave,
                    rates.speed_step,
                    arg.clamp(-BEND_RANGE, BEND_RANGE - 1),
                ),
                Function::TimeStretch => {
                    stream.set_time_stretch(arg.clamp(-BEND_RANGE, BEND_RANGE - 1))
                }
                _ => {}
            }
        }
        self.resync_play(ctx);
        tracing::debug!(
            loop_number = self.number,
            speed = ctx.output.stream().speed(),
            latency = ctx.output.latency(),
            "speed"
        );
    }

    pub(super) fn pitch_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let arg = event.argument;
        let step_range = ctx.preset.pitch_step_range;
        for stream in [ctx.input.stream_mut(), ctx.output.stream_mut()] {
            let rates = stream.rates();
            match event.function {
                Function::PitchOctave => stream.set_pitch(
                    arg.clamp(-OCTAVE_RANGE, OCTAVE_RANGE),
                    rates.pitch_step,
                    rates.pitch_bend,
                ),
                Function::PitchStep => stream.set_pitch(
                    rates.pitch_octave,
                    arg.clamp(-step_range, step_range),
                    rates.pitch_bend,
                ),
                Function::PitchBend => stream.set_pitch(
                    rates.pitch_octave,
                    rates.pitch_step,
                    arg.clamp(-BEND_RANGE, BEND_RANGE - 1),
                ),
                _ => {}
            }
        }
        tracing::debug!(loop_number = self.number, pitch = ctx.output.stream().pitch(), "pitch");
    }

    /// Puts the play cursor back at the latency distance from the record cursor, which
    /// changes with the speed.
    fn resync_play(&mut self, ctx: &mut LoopContext<'_>) {
        if self.mode.is_idle() || self.mode == LoopMode::Record {
            return;
        }
        if let Some(layer) = self.pre_play.or(self.play) {
            let frames = ctx.pool[layer].frames();
            self.play_frame = wrap_frame(self.frame + ctx.total_latency(), frames);
        }
    }

    pub(super) fn jump_play_event(&mut self, ctx: &mut LoopContext<'_>, event: &Event) {
        let info = event.jump;
        let loss = (self.frame - event.frame).max(0);
        if let Some(mute) = info.mute {
            self.play_muted = mute;
        }
        if let Some(freeze) = info.freeze {
            self.play_frozen = freeze;
        }
        if let Some(stutter) = info.stutter {
            self.stutter_play = None;
            if stutter {
                let cycle = self.cycle_frames(ctx.pool);
                if cycle > 0 {
                    let start = (self.play_frame.max(0) / cycle) * cycle;
                    self.stutter_play = Some((start, cycle));
                }
            }
        }

        match info.target {
            JumpTarget::Current => {}
            JumpTarget::Frame(frame) => match self.pre_play.or(self.play) {
                Some(layer) => {
                    let frames = ctx.pool[layer].frames();
                    self.play_frame = wrap_frame(frame + loss, frames);
                }
                None => tracing::error!(loop_number = self.number, "play jump with no layer"),
            },
            JumpTarget::ModeStart | JumpTarget::ModeEnd | JumpTarget::InsertEnd => match self.record {
                Some(record) => {
                    let frames = ctx.pool[record].frames();
                    self.pre_play = Some(record);
                    self.play_frame = match info.target {
                        JumpTarget::ModeStart => {
                            (self.mode_start_frame.max(0) + loss).clamp(0, frames)
                        }
                        // the jump runs ahead of the mode end by the total latency
                        JumpTarget::ModeEnd => {
                            wrap_frame(event.frame + ctx.total_latency() + loss, frames)
                        }
                        _ => {
                            let base = match self.stutter {
                                Some(stutter) => stutter.record_end,
                                None => self.mode_start_frame + self.gap_frames,
                            };
                            (base + loss).clamp(0, frames)
                        }
                    };
                }
                None => tracing::error!(loop_number = self.number, "play jump with no layer"),
            },
        }
        tracing::trace!(loop_number = self.number, play_frame = self.play_frame, loss, "play jump");
    }

    /// Record side of Restart; the play side jumped to the start already.
    pub(super) fn restart_event(&mut self, ctx: &mut LoopContext<'_>) {
        if self.mode.is_idle() || self.mode == LoopMode::Record {
            return;
        }
        if let Some(record) = self.record {
            if self.play.is_some() && ctx.pool[record].is_changed(ctx.config.noise_floor, true) {
                self.shift(ctx, true);
            }
        }
        let old = self.frame;
        self.frame = 0;
        ctx.events.offset(-old);
        ctx.sync.loop_local_start_point(ctx.track);
        tracing::debug!(loop_number = self.number, "restart");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, JumpInfo};
    use crate::loops::test_support::Rig;

    fn recorded(frames: usize, value: f32) -> Rig {
        let mut rig = Rig::new();
        {
            let (lp, mut ctx) = rig.split();
            lp.process_event(&mut ctx, Event::new(EventType::RecordStart, Function::Record, 0));
        }
        rig.run(frames, value);
        let (lp, mut ctx) = rig.split();
        let stop = Event::new(EventType::RecordStop, Function::Record, frames as i64);
        lp.process_event(&mut ctx, stop);
        rig
    }

    #[test]
    fn test_overdub_toggles() {
        let mut rig = recorded(64, 0.5);
        let (lp, mut ctx) = rig.split();
        lp.process_event(&mut ctx, Event::new(EventType::Overdub, Function::Overdub, 0));
        assert_eq!(lp.mode(), LoopMode::Overdub);
        assert!(lp.is_recording());
        lp.process_event(&mut ctx, Event::new(EventType::Overdub, Function::Overdub, 0));
        assert_eq!(lp.mode(), LoopMode::Play);
        assert!(!lp.is_recording());
    }

    #[test]
    fn test_replace_overwrites() {
        let mut rig = recorded(64, 0.5);
        {
            let (lp, mut ctx) = rig.split();
            lp.process_event(&mut ctx, Event::new(EventType::ReplaceStart, Function::Replace, 0));
            assert_eq!(lp.mode(), LoopMode::Replace);
        }
        rig.run(32, 0.25);
        let (lp, mut ctx) = rig.split();
        lp.process_event(&mut ctx, Event::new(EventType::ReplaceEnd, Function::Replace, 32));
        assert_eq!(lp.mode(), LoopMode::Play);
        let record = lp.record_layer().unwrap();
        let audio = ctx.pool[record].audio();
        // past the fade-in, before the fade-out
        assert_eq!(audio.frame(10)[0], 0.25);
        assert_eq!(audio.frame(40)[0], 0.5);
    }

    #[test]
    fn test_mute_toggles_mode() {
        let mut rig = recorded(64, 0.5);
        let (lp, mut ctx) = rig.split();
        lp.process_event(&mut ctx, Event::new(EventType::Mute, Function::Mute, 0).argument(1));
        assert!(lp.is_mute());
        assert_eq!(lp.mode(), LoopMode::Mute);
        assert_eq!(lp.effective_feedback(ctx.preset), 127);
        lp.process_event(&mut ctx, Event::new(EventType::Mute, Function::Mute, 0).argument(0));
        assert!(!lp.is_mute());
        assert_eq!(lp.mode(), LoopMode::Play);
    }

    #[test]
    fn test_pause_holds_record_cursor() {
        let mut rig = recorded(64, 0.5);
        rig.run(10, 0.0);
        {
            let (lp, mut ctx) = rig.split();
            lp.process_event(&mut ctx, Event::new(EventType::Pause, Function::Pause, 10).argument(1));
            assert!(lp.is_paused());
            assert!(!lp.is_playing());
        }
        rig.run(20, 0.0);
        let (lp, ctx) = rig.split();
        assert_eq!(lp.frame(), 10);
        assert_eq!(lp.next_boundary(&ctx), None);
    }

    #[test]
    fn test_reverse_reflects_cursor() {
        let mut rig = recorded(100, 0.5);
        rig.run(30, 0.0);
        let (lp, mut ctx) = rig.split();
        lp.process_event(&mut ctx, Event::new(EventType::Reverse, Function::Reverse, 30).argument(1));
        assert!(ctx.input.is_reverse());
        assert_eq!(lp.frame(), 69);
        // asking again for the same direction changes nothing
        lp.process_event(&mut ctx, Event::new(EventType::Reverse, Function::Reverse, 69).argument(1));
        assert_eq!(lp.frame(), 69);
    }

    #[test]
    fn test_reverse_play_reflects_before_loss() {
        let mut rig = recorded(100, 0.5);
        let (lp, mut ctx) = rig.split();
        lp.frame = 35;
        lp.play_frame = 45;
        let event = Event::new(EventType::ReversePlay, Function::Reverse, 30).argument(1);
        lp.process_event(&mut ctx, event);
        assert!(ctx.output.is_reverse());
        // 40 reflects to 59, then the 5 frames lost since the event was due
        assert_eq!(lp.play_frame(), 64);
    }

    #[test]
    fn test_jump_to_frame_compensates_loss() {
        let mut rig = recorded(100, 0.5);
        rig.run(20, 0.0);
        let (lp, mut ctx) = rig.split();
        let jump = Event::new(EventType::JumpPlay, Function::Restart, 15)
            .jump(JumpInfo::to(JumpTarget::Frame(0)));
        lp.process_event(&mut ctx, jump);
        assert_eq!(lp.play_frame(), 5);
    }

    #[test]
    fn test_speed_changes_rate() {
        let mut rig = recorded(100, 0.5);
        let (lp, mut ctx) = rig.split();
        let event = Event::new(EventType::Speed, Function::SpeedOctave, 0).argument(1);
        lp.process_event(&mut ctx, event);
        assert!((ctx.output.stream().speed() - 2.0).abs() < 1e-4);
        assert!((ctx.input.stream().speed() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_rehearse_alternates_passes() {
        let mut rig = recorded(50, 0.5);
        {
            let (lp, mut ctx) = rig.split();
            lp.process_event(&mut ctx, Event::new(EventType::RehearseStart, Function::Rehearse, 0));
            assert_eq!(lp.mode(), LoopMode::Rehearse);
        }
        rig.run(50, 0.0);
        {
            let (lp, mut ctx) = rig.split();
            lp.loop_event(&mut ctx);
            assert!(lp.is_recording());
        }
        rig.run(50, 0.75);
        let (lp, mut ctx) = rig.split();
        lp.loop_event(&mut ctx);
        assert!(!lp.is_recording());
        let play = lp.play_layer().unwrap();
        assert_eq!(ctx.pool[play].audio().frame(25)[0], 0.75);
        // not undoable by default
        assert_eq!(ctx.pool.undo_depth(lp.play_layer()), 1);
    }
}
