//! Turning invoked functions into scheduled events.
//!
//! Most functions act `input_latency` frames after the record cursor, so the change
//! lines up with the input the performer was playing when they pressed the button.
//! Quantized functions then wait for the next boundary. Changes on the play side are
//! scheduled as child events `total_latency` frames earlier.

use strata_core::{MuteMode, QuantizeMode, SyncMode};

use super::{Loop, LoopContext};
use crate::event::{Event, EventId, EventType, JumpInfo, JumpTarget};
use crate::function::{Action, Function};
use crate::mode::LoopMode;

impl Loop {
    /// Record frame an action invoked now applies at, before quantization.
    pub fn trigger_frame(&self, ctx: &LoopContext<'_>, action: &Action) -> i64 {
        if action.no_latency || !action.function.is_latency_delayed() {
            self.frame
        } else {
            self.frame + ctx.input_latency()
        }
    }

    /// Rounds `frame` up to the next boundary of the given quantize mode.
    pub fn quantize_frame(&self, ctx: &LoopContext<'_>, mode: QuantizeMode, frame: i64) -> i64 {
        let frames = self.frames(ctx.pool);
        if frames <= 0 || self.mode == LoopMode::Record {
            return frame;
        }
        let cycle = self.cycle_frames(ctx.pool).max(1);
        let unit = match mode {
            QuantizeMode::Off => return frame,
            QuantizeMode::SubCycle => (cycle / ctx.preset.subcycles.max(1) as i64).max(1),
            QuantizeMode::Cycle => cycle,
            QuantizeMode::Loop => frames,
        };
        if frame.rem_euclid(unit) == 0 {
            frame
        } else {
            (frame.div_euclid(unit) + 1) * unit
        }
    }

    /// Quantized start frame for `function` triggered at `trigger`.
    fn start_frame(&self, ctx: &LoopContext<'_>, function: Function, trigger: i64) -> i64 {
        if function.is_quantized() {
            self.quantize_frame(ctx, ctx.preset.quantize, trigger)
        } else {
            trigger
        }
    }

    /// Schedules the events for a pressed function. Returns the primary event, if any.
    pub fn schedule(&mut self, ctx: &mut LoopContext<'_>, action: &Action) -> Option<EventId> {
        let function = action.function;
        let trigger = self.trigger_frame(ctx, action);

        if function.is_record() {
            return self.schedule_record(ctx, action, trigger);
        }
        if self.mode == LoopMode::Record && ends_recording(function) {
            return self.end_recording_with(ctx, function, trigger);
        }
        if matches!(self.mode, LoopMode::Threshold | LoopMode::Synchronize)
            && !function.is_speed()
            && !function.is_pitch()
        {
            tracing::debug!(?function, mode = %self.mode, "ignored while armed");
            return None;
        }

        match function {
            Function::Overdub => {
                if self.mode.is_idle() {
                    return None;
                }
                Some(ctx.events.add(Event::new(EventType::Overdub, function, trigger)))
            }
            Function::Multiply | Function::SusUnroundedMultiply => {
                self.schedule_rounding(ctx, function, trigger, LoopMode::Multiply)
            }
            Function::Insert | Function::SusUnroundedInsert => {
                self.schedule_rounding(ctx, function, trigger, LoopMode::Insert)
            }
            Function::Stutter => self.schedule_rounding(ctx, function, trigger, LoopMode::Stutter),
            Function::Replace => self.schedule_replace(ctx, function, trigger, LoopMode::Replace),
            Function::Substitute => {
                self.schedule_replace(ctx, function, trigger, LoopMode::Substitute)
            }
            Function::Mute => self.schedule_mute(ctx, function, trigger),
            Function::Pause => self.schedule_pause(ctx, trigger),
            Function::Rehearse => {
                if self.mode == LoopMode::Rehearse {
                    return Some(ctx.events.add(Event::new(EventType::RehearseEnd, function, trigger)));
                }
                if self.play.is_none() || self.mode.is_idle() {
                    return None;
                }
                Some(ctx.events.add(Event::new(EventType::RehearseStart, function, trigger)))
            }
            Function::Reverse | Function::Forward | Function::Backward => {
                self.schedule_reverse(ctx, function, trigger)
            }
            Function::Restart => {
                if self.play.is_none() || self.mode.is_idle() {
                    return None;
                }
                let at = self.start_frame(ctx, function, trigger);
                let id = ctx.events.add(
                    Event::new(EventType::Restart, function, at).quantized(at != trigger),
                );
                Loop::schedule_play_jump(ctx, id, JumpInfo::to(JumpTarget::Frame(0)));
                Some(id)
            }
            f if f.is_speed() => Some(ctx.events.add(
                Event::new(EventType::Speed, f, self.frame)
                    .argument(action.arg)
                    .not_undoable(),
            )),
            f if f.is_pitch() => Some(ctx.events.add(
                Event::new(EventType::Pitch, f, self.frame)
                    .argument(action.arg)
                    .not_undoable(),
            )),
            _ => {
                tracing::debug!(?function, "not a loop function");
                None
            }
        }
    }

    /// Release edge of a sustain function.
    pub fn release(&mut self, ctx: &mut LoopContext<'_>, action: &Action) -> Option<EventId> {
        let function = action.function;
        let trigger = self.trigger_frame(ctx, action);
        match (function, self.mode) {
            (Function::SusRecord, LoopMode::Record) => self.schedule_record(ctx, action, trigger),
            (Function::SusRecord, LoopMode::Threshold | LoopMode::Synchronize) => {
                self.schedule_record(ctx, action, trigger)
            }
            (Function::SusUnroundedMultiply, LoopMode::Multiply)
            | (Function::SusUnroundedInsert, LoopMode::Insert) => {
                self.schedule_mode_end(ctx, function, trigger)
            }
            _ => None,
        }
    }

    fn schedule_record(
        &mut self,
        ctx: &mut LoopContext<'_>,
        action: &Action,
        trigger: i64,
    ) -> Option<EventId> {
        let function = action.function;
        match self.mode {
            LoopMode::Reset => {
                let start = Event::new(EventType::RecordStart, function, self.frame)
                    .no_latency(action.no_latency);
                if ctx.preset.record_threshold > 0 {
                    self.mode = LoopMode::Threshold;
                    tracing::debug!(threshold = ctx.preset.record_threshold, "waiting for input");
                    return Some(ctx.events.add(start.pending()));
                }
                if ctx.preset.sync_mode != SyncMode::Off {
                    self.mode = LoopMode::Synchronize;
                    tracing::debug!(sync = ?ctx.preset.sync_mode, "waiting for sync");
                    return Some(ctx.events.add(start.pending()));
                }
                Some(ctx.events.add(start))
            }
            LoopMode::Threshold | LoopMode::Synchronize => {
                ctx.events.remove_kind(EventType::RecordStart);
                self.mode = LoopMode::Reset;
                tracing::debug!("armed recording cancelled");
                None
            }
            LoopMode::Record => {
                if let Some(stop) = ctx.events.find_event_mut(EventType::RecordStop) {
                    if function == Function::AutoRecord && stop.function == Function::AutoRecord {
                        let unit = ctx.preset.auto_record_frames(ctx.config.sample_rate) as i64;
                        stop.frame += unit;
                        stop.increase += 1;
                        tracing::debug!(frame = stop.frame, bars = stop.increase + 1, "auto record extended");
                    }
                    return Some(stop.id);
                }
                let mut stop = Event::new(EventType::RecordStop, function, trigger.max(0));
                if ctx.preset.sync_mode != SyncMode::Off {
                    stop = stop.pending();
                }
                Some(ctx.events.add(stop))
            }
            mode if mode.is_rounding() => self.schedule_mode_end(ctx, function, trigger),
            LoopMode::Rehearse => {
                Some(ctx.events.add(Event::new(EventType::RehearseEnd, function, trigger)))
            }
            _ => Some(ctx.events.add(Event::new(EventType::RecordStart, function, trigger))),
        }
    }

    /// Ends the initial recording and runs `function` once it has stopped.
    fn end_recording_with(
        &mut self,
        ctx: &mut LoopContext<'_>,
        function: Function,
        trigger: i64,
    ) -> Option<EventId> {
        if let Some(stop) = ctx.events.find_event_mut(EventType::RecordStop) {
            stop.ending = Some(function);
            return Some(stop.id);
        }
        let mut stop = Event::new(EventType::RecordStop, Function::Record, trigger.max(0)).ending(function);
        if ctx.preset.sync_mode != SyncMode::Off {
            stop = stop.pending();
        }
        tracing::debug!(?function, "recording ends into another function");
        Some(ctx.events.add(stop))
    }

    fn schedule_rounding(
        &mut self,
        ctx: &mut LoopContext<'_>,
        function: Function,
        trigger: i64,
        mode: LoopMode,
    ) -> Option<EventId> {
        if self.mode.is_rounding() {
            return self.schedule_mode_end(ctx, function, trigger);
        }
        if self.play.is_none() || self.mode.is_idle() {
            return None;
        }
        let (kind, jump) = match mode {
            LoopMode::Multiply => (EventType::MultiplyStart, None),
            LoopMode::Insert => (
                EventType::InsertStart,
                Some(JumpInfo {
                    freeze: Some(true),
                    ..Default::default()
                }),
            ),
            _ => (
                EventType::StutterStart,
                Some(JumpInfo {
                    stutter: Some(true),
                    ..Default::default()
                }),
            ),
        };
        if let Some(pending) = ctx.events.find_event(kind) {
            return Some(pending.id);
        }
        let at = self.start_frame(ctx, function, trigger);
        let id = ctx.events.add(Event::new(kind, function, at).quantized(at != trigger));
        if let Some(jump) = jump {
            Loop::schedule_play_jump(ctx, id, jump);
        }
        Some(id)
    }

    fn schedule_replace(
        &mut self,
        ctx: &mut LoopContext<'_>,
        function: Function,
        trigger: i64,
        mode: LoopMode,
    ) -> Option<EventId> {
        let (start, end) = match mode {
            LoopMode::Replace => (EventType::ReplaceStart, EventType::ReplaceEnd),
            _ => (EventType::SubstituteStart, EventType::SubstituteEnd),
        };
        let at = self.start_frame(ctx, function, trigger);
        if self.mode == mode {
            let id = ctx.events.add(Event::new(end, function, at).quantized(at != trigger));
            if mode == LoopMode::Replace {
                Loop::schedule_play_jump(ctx, id, JumpInfo::mute(self.mute));
            }
            return Some(id);
        }
        if self.play.is_none() || self.mode.is_idle() {
            return None;
        }
        let id = ctx.events.add(Event::new(start, function, at).quantized(at != trigger));
        if mode == LoopMode::Replace {
            // what is being replaced is not heard
            Loop::schedule_play_jump(ctx, id, JumpInfo::mute(true));
        }
        Some(id)
    }

    fn schedule_mute(
        &mut self,
        ctx: &mut LoopContext<'_>,
        function: Function,
        trigger: i64,
    ) -> Option<EventId> {
        if self.mode.is_idle() {
            return None;
        }
        let pending = ctx
            .events
            .iter()
            .find(|e| e.kind == EventType::Mute && e.parent.is_none())
            .map(|e| e.id);
        if let Some(pending) = pending {
            ctx.events.remove_event(pending);
            tracing::debug!("pending mute cancelled");
            return None;
        }

        let mute = !self.mute;
        let paused = ctx.preset.mute_mode == MuteMode::Pause;
        // a paused loop does not advance, so resuming cannot wait for a frame
        let at = if !mute && paused {
            self.frame
        } else {
            self.start_frame(ctx, function, trigger)
        };
        let id = ctx.events.add(
            Event::new(EventType::Mute, function, at)
                .argument(mute as i32)
                .quantized(at != trigger),
        );
        let jump = if !mute && ctx.preset.mute_mode == MuteMode::Start {
            JumpInfo {
                target: JumpTarget::Frame(0),
                mute: Some(false),
                ..Default::default()
            }
        } else {
            JumpInfo::mute(mute)
        };
        Loop::schedule_play_jump(ctx, id, jump);
        Some(id)
    }

    fn schedule_pause(&mut self, ctx: &mut LoopContext<'_>, trigger: i64) -> Option<EventId> {
        if self.mode.is_idle() {
            return None;
        }
        let (at, pause) = if self.pause {
            (self.frame, false)
        } else {
            (trigger, true)
        };
        Some(ctx.events.add(
            Event::new(EventType::Pause, Function::Pause, at).argument(pause as i32),
        ))
    }

    fn schedule_reverse(
        &mut self,
        ctx: &mut LoopContext<'_>,
        function: Function,
        trigger: i64,
    ) -> Option<EventId> {
        let pending = ctx
            .events
            .iter()
            .find(|e| e.kind == EventType::Reverse)
            .map(|e| (e.id, e.argument != 0));
        let current = match pending {
            Some((_, reverse)) => reverse,
            None => ctx.input.is_reverse(),
        };
        let reverse = match function {
            Function::Forward => false,
            Function::Backward => true,
            _ => !current,
        };
        if let Some((id, _)) = pending {
            if function == Function::Reverse {
                // pressing again before it happened takes it back
                ctx.events.remove_event(id);
                return None;
            }
        }
        if reverse == current {
            return None;
        }

        let at = self.start_frame(ctx, function, trigger);
        let id = ctx.events.add(
            Event::new(EventType::Reverse, function, at)
                .argument(reverse as i32)
                .quantized(at != trigger),
        );
        let play = Event::new(EventType::ReversePlay, function, at - ctx.total_latency())
            .argument(reverse as i32)
            .not_undoable();
        ctx.events.add_child(id, play);
        Some(id)
    }
}

/// Pressing one of these during the initial recording closes the loop first.
fn ends_recording(function: Function) -> bool {
    matches!(
        function,
        Function::Overdub
            | Function::Multiply
            | Function::SusUnroundedMultiply
            | Function::Insert
            | Function::SusUnroundedInsert
            | Function::Stutter
            | Function::Replace
            | Function::Substitute
            | Function::Mute
            | Function::Rehearse
            | Function::Reverse
            | Function::Forward
            | Function::Backward
    )
}

#[cfg(test)]
mod tests {
    use strata_core::{EngineConfig, MuteMode, QuantizeMode};

    use super::*;
    use crate::loops::test_support::Rig;

    /// A 64-frame, one-cycle loop in Play with the record cursor at `at`.
    fn playing(mut rig: Rig, at: usize) -> Rig {
        {
            let (lp, mut ctx) = rig.split();
            lp.process_event(&mut ctx, Event::new(EventType::RecordStart, Function::Record, 0));
        }
        rig.run(64, 0.5);
        {
            let (lp, mut ctx) = rig.split();
            let frame = lp.frame();
            lp.process_event(&mut ctx, Event::new(EventType::RecordStop, Function::Record, frame));
        }
        if at > 0 {
            rig.run(at, 0.0);
        }
        rig.events.clear();
        rig
    }

    fn latency_rig() -> Rig {
        Rig::with_config(EngineConfig {
            channels: 1,
            fade_frames: 4,
            max_interrupt_frames: 256,
            input_latency: 8,
            output_latency: 4,
            ..Default::default()
        })
    }

    #[test]
    fn test_quantize_frame() {
        let mut rig = playing(Rig::new(), 10);
        rig.preset.subcycles = 4;
        let (lp, ctx) = rig.split();
        assert_eq!(lp.quantize_frame(&ctx, QuantizeMode::Off, 10), 10);
        assert_eq!(lp.quantize_frame(&ctx, QuantizeMode::SubCycle, 10), 16);
        assert_eq!(lp.quantize_frame(&ctx, QuantizeMode::Cycle, 10), 64);
        assert_eq!(lp.quantize_frame(&ctx, QuantizeMode::Loop, 64), 64);
        assert_eq!(lp.quantize_frame(&ctx, QuantizeMode::SubCycle, 32), 32);
    }

    #[test]
    fn test_record_from_reset_is_immediate() {
        let mut rig = latency_rig();
        let (lp, mut ctx) = rig.split();
        let id = lp.schedule(&mut ctx, &Action::new(Function::Record));
        let event = id.and_then(|id| ctx.events.get(id)).map(|e| (e.kind, e.frame, e.pending));
        assert_eq!(event, Some((EventType::RecordStart, 0, false)));
    }

    #[test]
    fn test_threshold_arms_and_second_press_cancels() {
        let mut rig = Rig::new();
        rig.preset.record_threshold = 2;
        let (lp, mut ctx) = rig.split();
        lp.schedule(&mut ctx, &Action::new(Function::Record));
        assert_eq!(lp.mode(), LoopMode::Threshold);
        assert!(ctx.events.has_pending());

        lp.schedule(&mut ctx, &Action::new(Function::Record));
        assert_eq!(lp.mode(), LoopMode::Reset);
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn test_record_stop_is_latency_delayed() {
        let mut rig = latency_rig();
        {
            let (lp, mut ctx) = rig.split();
            lp.schedule(&mut ctx, &Action::new(Function::Record));
            let id = ctx.events.next_event(0, 1).unwrap();
            let event = ctx.events.take(id).unwrap();
            lp.process_event(&mut ctx, event);
        }
        rig.run(100, 0.5);
        let (lp, mut ctx) = rig.split();
        // 8 frames of pre-roll were skipped
        assert_eq!(lp.frame(), 92);
        let id = lp.schedule(&mut ctx, &Action::new(Function::Record)).unwrap();
        assert_eq!(ctx.events.get(id).map(|e| e.frame), Some(100));
    }

    #[test]
    fn test_auto_record_press_extends() {
        let mut rig = Rig::new();
        {
            let (lp, mut ctx) = rig.split();
            lp.process_event(&mut ctx, Event::new(EventType::RecordStart, Function::AutoRecord, 0));
        }
        let unit = rig.preset.auto_record_frames(rig.config.sample_rate) as i64;
        let (lp, mut ctx) = rig.split();
        lp.schedule(&mut ctx, &Action::new(Function::AutoRecord));
        let stop = ctx.events.find_event(EventType::RecordStop).unwrap();
        assert_eq!(stop.frame, unit * 2);
        assert_eq!(stop.increase, 1);
    }

    #[test]
    fn test_overdub_during_record_becomes_ending() {
        let mut rig = Rig::new();
        {
            let (lp, mut ctx) = rig.split();
            lp.process_event(&mut ctx, Event::new(EventType::RecordStart, Function::Record, 0));
        }
        rig.run(40, 0.5);
        let (lp, mut ctx) = rig.split();
        let id = lp.schedule(&mut ctx, &Action::new(Function::Overdub)).unwrap();
        let stop = ctx.events.get(id).unwrap();
        assert_eq!(stop.kind, EventType::RecordStop);
        assert_eq!(stop.ending, Some(Function::Overdub));

        let event = ctx.events.take(id).unwrap();
        lp.process_event(&mut ctx, event);
        assert_eq!(lp.mode(), LoopMode::Play);
        // the overdub was scheduled at the new loop start
        let overdub = ctx.events.find_event(EventType::Overdub).map(|e| e.frame);
        assert_eq!(overdub, Some(0));
    }

    #[test]
    fn test_multiply_quantized_start() {
        let mut rig = playing(Rig::new(), 10);
        rig.preset.quantize = QuantizeMode::Cycle;
        let (lp, mut ctx) = rig.split();
        let id = lp.schedule(&mut ctx, &Action::new(Function::Multiply)).unwrap();
        let event = ctx.events.get(id).unwrap();
        assert_eq!((event.kind, event.frame, event.quantized), (EventType::MultiplyStart, 64, true));

        // a second press while the start is pending is absorbed
        assert_eq!(lp.schedule(&mut ctx, &Action::new(Function::Multiply)), Some(id));
        assert_eq!(ctx.events.len(), 1);
    }

    #[test]
    fn test_insert_freezes_play_side() {
        let mut rig = playing(latency_rig(), 20);
        let (lp, mut ctx) = rig.split();
        let id = lp.schedule(&mut ctx, &Action::new(Function::Insert)).unwrap();
        let start = ctx.events.get(id).map(|e| e.frame).unwrap();
        let jump = ctx.events.find_child(id, EventType::JumpPlay).unwrap();
        assert_eq!(jump.frame, start - 12);
        assert_eq!(jump.jump.freeze, Some(true));
    }

    #[test]
    fn test_mute_toggle_cancels_pending() {
        let mut rig = playing(Rig::new(), 10);
        rig.preset.quantize = QuantizeMode::Loop;
        let (lp, mut ctx) = rig.split();
        let id = lp.schedule(&mut ctx, &Action::new(Function::Mute)).unwrap();
        assert_eq!(ctx.events.get(id).map(|e| e.argument), Some(1));
        assert_eq!(ctx.events.len(), 2);

        assert_eq!(lp.schedule(&mut ctx, &Action::new(Function::Mute)), None);
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn test_unmute_start_jumps_to_loop_start() {
        let mut rig = playing(Rig::new(), 10);
        rig.preset.mute_mode = MuteMode::Start;
        {
            let (lp, mut ctx) = rig.split();
            let frame = lp.frame();
            lp.process_event(&mut ctx, Event::new(EventType::Mute, Function::Mute, frame).argument(1));
            assert!(lp.is_mute());
        }
        let (lp, mut ctx) = rig.split();
        let id = lp.schedule(&mut ctx, &Action::new(Function::Mute)).unwrap();
        let jump = ctx.events.find_child(id, EventType::JumpPlay).unwrap();
        assert_eq!(jump.jump.target, JumpTarget::Frame(0));
        assert_eq!(jump.jump.mute, Some(false));
    }

    #[test]
    fn test_reverse_schedules_play_side_child() {
        let mut rig = playing(latency_rig(), 30);
        let (lp, mut ctx) = rig.split();
        let id = lp.schedule(&mut ctx, &Action::new(Function::Reverse)).unwrap();
        let frame = ctx.events.get(id).map(|e| e.frame).unwrap();
        let play = ctx.events.find_child(id, EventType::ReversePlay).unwrap();
        assert_eq!(play.frame, frame - 12);
        assert_eq!(play.argument, 1);

        // Forward while already going forward does nothing once the toggle is taken back
        assert_eq!(lp.schedule(&mut ctx, &Action::new(Function::Reverse)), None);
        assert_eq!(lp.schedule(&mut ctx, &Action::new(Function::Forward)), None);
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn test_speed_is_immediate() {
        let mut rig = playing(latency_rig(), 30);
        let (lp, mut ctx) = rig.split();
        let id = lp
            .schedule(&mut ctx, &Action::new(Function::SpeedStep).arg(12))
            .unwrap();
        let event = ctx.events.get(id).unwrap();
        assert_eq!((event.frame, event.argument), (lp.frame(), 12));
    }

    #[test]
    fn test_sus_multiply_release_ends_unrounded() {
        let mut rig = playing(Rig::new(), 10);
        {
            let (lp, mut ctx) = rig.split();
            let frame = lp.frame();
            lp.process_event(
                &mut ctx,
                Event::new(EventType::MultiplyStart, Function::SusUnroundedMultiply, frame),
            );
        }
        rig.run(30, 0.0);
        let (lp, mut ctx) = rig.split();
        let id = lp
            .release(&mut ctx, &Action::new(Function::SusUnroundedMultiply).up())
            .unwrap();
        let end = ctx.events.get(id).unwrap();
        assert!(end.unrounded);
        assert_eq!(end.frame, lp.frame());
    }
}
