//! Leaving one loop and entering another.

use strata_core::{wrap_frame, EmptyLoopAction, SwitchDuration, SwitchLocation, TransferMode};

use super::{Loop, LoopContext};
use crate::event::{Event, EventType, JumpInfo};
use crate::function::{Action, Function};
use crate::layer::LayerId;
use crate::mode::LoopMode;
use crate::stream::{Rates, StreamState};

/// The loop being left, as the next loop sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwitchOrigin {
    pub number: usize,
    pub frame: i64,
    pub frames: i64,
    pub cycles: u32,
    pub layer: Option<LayerId>,
    pub stream: StreamState,
}

fn transfer<T: Copy>(mode: TransferMode, follow: T, restore: T, off: T) -> T {
    match mode {
        TransferMode::Off => off,
        TransferMode::Follow => follow,
        TransferMode::Restore => restore,
    }
}

impl Loop {
    /// Settles the loop so it can be left, and describes it for the loop coming next.
    pub fn switch_out(&mut self, ctx: &mut LoopContext<'_>) -> SwitchOrigin {
        self.finish_recording(ctx);
        if let (Some(record), Some(_)) = (self.record, self.play) {
            if ctx.pool[record].is_changed(ctx.config.noise_floor, false) {
                self.shift(ctx, false);
            }
        }
        self.cut_output(ctx);

        self.restore_state = StreamState {
            reverse: ctx.input.is_reverse(),
            rates: ctx.output.stream().rates(),
            frame: self.frame,
            overdub: self.overdub,
            mute: self.mute,
        };
        self.pre_play = None;
        self.play_muted = self.mute;
        self.play_frozen = false;
        self.stutter_play = None;

        SwitchOrigin {
            number: self.number,
            frame: self.frame,
            frames: self.frames(ctx.pool),
            cycles: self.cycles(ctx.pool),
            layer: self.play,
            stream: self.restore_state,
        }
    }

    /// Ends whatever mode would otherwise be left running.
    fn finish_recording(&mut self, ctx: &mut LoopContext<'_>) {
        let frame = self.frame;
        match self.mode {
            LoopMode::Record => {
                let stop = Event::new(EventType::RecordStop, Function::Record, frame);
                self.record_stop_event(ctx, &stop);
            }
            LoopMode::Threshold | LoopMode::Synchronize => self.mode = LoopMode::Reset,
            LoopMode::Multiply => {
                let mut end = Event::new(EventType::MultiplyEnd, Function::Multiply, frame);
                end.unrounded = true;
                self.multiply_end_event(ctx, &end);
            }
            LoopMode::Insert => {
                let mut end = Event::new(EventType::InsertEnd, Function::Insert, frame);
                end.unrounded = true;
                self.insert_end_event(ctx, &end);
            }
            LoopMode::Stutter => self.stutter_end_event(ctx),
            LoopMode::Replace | LoopMode::Substitute => self.replace_end_event(ctx),
            LoopMode::Rehearse => self.rehearse_end_event(ctx),
            _ => {}
        }
    }

    /// Becomes the track's current loop.
    ///
    /// `event` is the Switch or Return that brought us here; its stacked functions run
    /// once the new position is set.
    pub fn switch_in(
        &mut self,
        ctx: &mut LoopContext<'_>,
        origin: &SwitchOrigin,
        event: &Event,
        is_return: bool,
    ) {
        let preset = ctx.preset;
        let saved = self.restore_state;
        let reverse = transfer(preset.reverse_transfer, origin.stream.reverse, saved.reverse, false);
        let speed = transfer(
            preset.speed_transfer,
            origin.stream.rates,
            saved.rates,
            Rates::default(),
        )
        .speed_only();
        let pitch = transfer(
            preset.pitch_transfer,
            origin.stream.rates,
            saved.rates,
            Rates::default(),
        )
        .pitch_only();
        let rates = Rates {
            pitch_octave: pitch.pitch_octave,
            pitch_step: pitch.pitch_step,
            pitch_bend: pitch.pitch_bend,
            ..speed
        };
        for stream in [ctx.input.stream_mut(), ctx.output.stream_mut()] {
            stream.set_reverse(reverse);
            stream.set_rates(rates);
        }

        let mut pending: smallvec::SmallVec<[Function; 4]> = event.stacked.clone();
        if self.is_empty() && !is_return {
            let stacked = |f: Function| event.stacked.contains(&f);
            if stacked(Function::Multiply) {
                self.copy_layer(ctx, origin, false);
            } else if stacked(Function::Insert) {
                self.copy_layer(ctx, origin, true);
            } else {
                match preset.empty_loop_action {
                    EmptyLoopAction::CopySound => self.copy_layer(ctx, origin, false),
                    EmptyLoopAction::CopyTiming => self.copy_layer(ctx, origin, true),
                    EmptyLoopAction::Record if !event.stacked.iter().any(|f| f.is_record()) => {
                        pending.push(Function::Record);
                    }
                    _ => {}
                }
            }
        }

        if !self.is_empty() {
            let location = if is_return {
                preset.return_location
            } else {
                preset.switch_location
            };
            self.locate(ctx, origin, location);

            let overdub = transfer(preset.overdub_transfer, origin.stream.overdub, saved.overdub, false);
            let mute = transfer(preset.mute_transfer, origin.stream.mute, saved.mute, false);
            self.mute = mute;
            self.play_muted = mute;
            self.overdub = overdub;
            if matches!(
                self.mode,
                LoopMode::Play | LoopMode::Overdub | LoopMode::Mute | LoopMode::Run
            ) {
                self.mode = self.resting_mode();
                self.set_recording(ctx, overdub && !mute);
            }
            self.schedule_duration(ctx, origin, is_return);
        }

        for function in pending {
            self.schedule(ctx, &Action::new(function).no_latency());
        }
        ctx.sync.loop_switch(ctx.track, origin.number, self.number);
        tracing::debug!(
            track = ctx.track,
            from = origin.number,
            to = self.number,
            is_return,
            frame = self.frame,
            "loop switch"
        );
    }

    /// Places both cursors for the given switch location.
    fn locate(&mut self, ctx: &mut LoopContext<'_>, origin: &SwitchOrigin, location: SwitchLocation) {
        let frames = self.frames(ctx.pool);
        if frames <= 0 {
            return;
        }
        let total = ctx.total_latency();
        self.pre_play = None;
        match location {
            SwitchLocation::Follow | SwitchLocation::Restore => {
                let target = if location == SwitchLocation::Follow {
                    origin.frame
                } else {
                    self.restore_state.frame
                };
                self.frame = wrap_frame(target, frames);
                self.play_frame = wrap_frame(self.frame + total, frames);
            }
            SwitchLocation::Start | SwitchLocation::Random => {
                let target = if location == SwitchLocation::Random {
                    let cycles = self.cycles(ctx.pool).max(1);
                    fastrand::u32(0..cycles) as i64 * self.cycle_frames(ctx.pool)
                } else {
                    0
                };
                // the play side starts at the target; recording catches up
                self.play_frame = wrap_frame(target, frames);
                self.frame = wrap_frame(target - total, frames);
            }
        }
    }

    fn schedule_duration(&mut self, ctx: &mut LoopContext<'_>, origin: &SwitchOrigin, is_return: bool) {
        self.return_loop = None;
        if is_return {
            return;
        }
        let end = self.frames(ctx.pool);
        match ctx.preset.switch_duration {
            SwitchDuration::Permanent => {}
            SwitchDuration::Once => {
                let id = ctx.events.add(
                    Event::new(EventType::Mute, Function::Mute, end)
                        .argument(1)
                        .not_undoable(),
                );
                Loop::schedule_play_jump(ctx, id, JumpInfo::mute(true));
            }
            SwitchDuration::OnceReturn => {
                ctx.events.add(
                    Event::new(EventType::Return, Function::SelectLoop, end)
                        .number(origin.number)
                        .not_undoable(),
                );
                self.return_loop = Some(origin.number);
            }
            SwitchDuration::Sustain | SwitchDuration::SustainReturn => {
                let at_end = ctx.preset.switch_duration == SwitchDuration::SustainReturn;
                ctx.events.add(
                    Event::new(EventType::SusReturn, Function::SelectLoop, end)
                        .number(origin.number)
                        .argument(at_end as i32)
                        .pending(),
                );
                self.return_loop = Some(origin.number);
            }
        }
    }

    /// Fills an empty loop from the loop being left. A timing copy is silent and
    /// plays in Run until something is recorded into it.
    fn copy_layer(&mut self, ctx: &mut LoopContext<'_>, origin: &SwitchOrigin, timing_only: bool) {
        let Some(source) = origin.layer.filter(|id| ctx.pool.contains(*id)) else {
            return;
        };
        if origin.frames <= 0 {
            return;
        }
        let id = ctx.pool.alloc();
        {
            let (src, dest) = ctx.pool.pair_mut(source, id);
            if timing_only {
                dest.set_frames(src.frames());
            } else {
                dest.load_audio(src.audio());
            }
            dest.set_cycles(origin.cycles.max(1));
        }
        self.commit(ctx, id);
        self.record = Some(ctx.pool.copy(id));
        self.timing_only = timing_only;
        self.mode = if timing_only { LoopMode::Run } else { LoopMode::Play };
        self.frame = 0;
        self.play_frame = 0;
        ctx.sync.loop_resize(ctx.track, origin.frames, origin.cycles);
        tracing::debug!(
            from = origin.number,
            to = self.number,
            frames = origin.frames,
            timing_only,
            "loop copied"
        );
    }
}
