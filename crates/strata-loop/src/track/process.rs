//! The per-interrupt pass: carving the block at events and loop boundaries.

use super::Track;
use crate::event::{Event, EventId, EventType};
use crate::loops::track_copy_frame;
use crate::mode::LoopMode;

/// Upper bound on events and boundaries handled in one interrupt.
const MAX_SLICES: usize = 1024;

/// What the block is cut at next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slice {
    Event(EventId),
    Boundary,
}

/// Whether an event landing exactly on the loop boundary runs before the boundary.
fn wins_tie(kind: EventType) -> bool {
    kind.is_mode_end()
        || matches!(
            kind,
            EventType::RecordStop | EventType::Switch | EventType::Return | EventType::SusReturn
        )
}

impl Track {
    /// Records `input` and mixes this track's output into `out`. Both are interleaved
    /// at the configured channel count; `out` sets the block length.
    pub fn process(&mut self, input: &[f32], out: &mut [f32]) {
        let ch = self.config.channels;
        let frames = out.len() / ch;
        if frames == 0 {
            return;
        }
        let loop_frames = self.input.begin(input, frames);
        self.output.begin(frames);

        let mut slices = 0;
        while self.input.remaining() > 0 {
            slices += 1;
            if slices > MAX_SLICES {
                tracing::error!(track = self.number, frame = self.frame(), "interrupt did not converge");
                let rest = self.input.remaining();
                self.advance(rest);
                break;
            }

            let remaining = self.input.remaining() as i64;
            if self.mode() == LoopMode::Threshold {
                match self.threshold_crossing() {
                    Some(at) => {
                        self.advance(at);
                        let frame = self.frame();
                        self.events.activate_pending(EventType::RecordStart, frame);
                        tracing::debug!(track = self.number, frame, "threshold crossed");
                    }
                    None => {
                        self.advance(remaining as usize);
                        continue;
                    }
                }
            }

            let remaining = self.input.remaining() as i64;
            let frame = self.frame();
            let (slice, at) = match self.next_slice(frame, remaining) {
                Some(next) => next,
                None => {
                    self.advance(remaining as usize);
                    continue;
                }
            };
            self.advance((at - frame).clamp(0, remaining) as usize);
            match slice {
                Slice::Boundary => {
                    let (lp, mut ctx) = self.split();
                    lp.loop_event(&mut ctx);
                }
                Slice::Event(id) => {
                    let elapsed = (loop_frames - self.input.remaining()) as i64;
                    self.dispatch(id, elapsed);
                }
            }
        }

        self.publish();
        let rendered = self.output.finish();
        for (o, s) in out.iter_mut().zip(rendered) {
            *o += *s;
        }
    }

    /// Earliest event or boundary inside the next `remaining` frames, and its frame.
    fn next_slice(&mut self, frame: i64, remaining: i64) -> Option<(Slice, i64)> {
        let event = self
            .events
            .next_event(frame, remaining)
            .and_then(|id| self.events.get(id))
            .map(|e| (e.id, e.kind, e.frame.max(frame)));
        let boundary = {
            let (lp, ctx) = self.split();
            lp.next_boundary(&ctx)
        }
        .map(|b| b.max(frame))
        .filter(|b| *b < frame + remaining);

        match (event, boundary) {
            (None, None) => None,
            (Some((id, _, at)), None) => Some((Slice::Event(id), at)),
            (None, Some(b)) => Some((Slice::Boundary, b)),
            (Some((id, kind, at)), Some(b)) => {
                if at < b || (at == b && wins_tie(kind)) {
                    Some((Slice::Event(id), at))
                } else {
                    Some((Slice::Boundary, b))
                }
            }
        }
    }

    /// Frames until the input first reaches the record threshold.
    fn threshold_crossing(&self) -> Option<usize> {
        let ch = self.config.channels;
        let level = self.preset.threshold_level();
        self.input
            .peek(self.input.remaining())
            .chunks(ch)
            .position(|frame| frame.iter().any(|s| s.abs() >= level))
    }

    /// Records and plays the next `frames` loop frames.
    fn advance(&mut self, frames: usize) {
        if frames == 0 {
            return;
        }
        let mut block = core::mem::take(&mut self.block);
        self.input.read(frames, &mut block);
        let (lp, mut ctx) = self.split();
        lp.record(&mut ctx, &block);
        lp.play(&mut ctx, frames as i64);
        self.block = block;
    }

    fn dispatch(&mut self, id: EventId, elapsed: i64) {
        let Some(event) = self.events.take(id) else {
            return;
        };
        match event.kind {
            EventType::Switch => self.switch_loop(&event, false),
            EventType::Return | EventType::SusReturn => self.switch_loop(&event, true),
            EventType::Track => self.apply_copy(elapsed),
            _ => {
                let (lp, mut ctx) = self.split();
                lp.process_event(&mut ctx, event);
            }
        }
    }

    fn switch_loop(&mut self, event: &Event, is_return: bool) {
        let target = event.number;
        if target >= self.loops.len() || target == self.current {
            tracing::warn!(track = self.number, target, current = self.current, "switch ignored");
            return;
        }
        let origin = {
            let (lp, mut ctx) = self.split();
            lp.switch_out(&mut ctx)
        };
        // whatever was scheduled belonged to the loop being left
        let switch = event.id;
        for dangling in self.events.iter().filter(|e| {
            e.parent != Some(switch)
                && e.parent.and_then(|p| self.events.get(p)).and_then(|p| p.parent) != Some(switch)
        }) {
            tracing::error!(
                track = self.number,
                kind = ?dangling.kind,
                frame = dangling.frame,
                "event left behind by switch"
            );
        }
        self.events.clear();
        self.current = target;
        let (lp, mut ctx) = self.split();
        lp.switch_in(&mut ctx, &origin, event, is_return);
        lp.validate(&ctx);
    }

    fn apply_copy(&mut self, elapsed: i64) {
        let Some(copy) = self.pending_copy.take() else {
            tracing::warn!(track = self.number, "track copy event without a copy");
            return;
        };
        let frame = track_copy_frame(copy.frame, copy.audio.frames() as i64, elapsed);
        let (lp, mut ctx) = self.split();
        lp.track_copy(&mut ctx, &copy.audio, copy.cycles, frame, copy.timing_only);
        lp.validate(&ctx);
    }

    /// Releases a recording waiting on the synchronizer.
    pub fn sync_pulse(&mut self) {
        let lp = &self.loops[self.current];
        let frame = lp.frame();
        if self.events.activate_pending(EventType::RecordStart, frame) {
            tracing::debug!(track = self.number, frame, "sync record start");
            return;
        }
        let stop = frame.max(0) + self.input.latency() as i64;
        if self.events.activate_pending(EventType::RecordStop, stop) {
            tracing::debug!(track = self.number, frame = stop, "sync record stop");
        }
    }

    fn publish(&mut self) {
        let next_loop = self.events.find_event(EventType::Switch).map(|e| e.number);
        let current = self.current;
        let mut state = self.loops[current].take_state(&self.pool, &self.output);
        state.next_loop = next_loop;
        self.monitor.publish(&state);
        for lp in &self.loops {
            let mut summary = lp.summary(&self.pool);
            summary.active = lp.number() == current;
            summary.pending = next_loop == Some(lp.number());
            self.monitor.publish_summary(&summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use strata_core::{EngineConfig, Preset, SyncMode};

    use super::super::test_support::{config, run, track};
    use super::*;
    use crate::function::{Action, Function};
    use crate::loops::test_support::warnings;

    #[test]
    fn test_tie_rule() {
        assert!(wins_tie(EventType::RecordStop));
        assert!(wins_tie(EventType::MultiplyEnd));
        assert!(wins_tie(EventType::Switch));
        assert!(!wins_tie(EventType::Overdub));
        assert!(!wins_tie(EventType::Mute));
    }

    #[test]
    fn test_record_and_play_back() {
        let mut track = track(Preset::default());
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 100, 0.5);
        assert_eq!(track.mode(), LoopMode::Record);
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 1, 0.0);
        assert_eq!(track.mode(), LoopMode::Play);
        assert_eq!(track.frames(), 100);
        assert_eq!(track.layer_count(), 1);

        // a full pass of silence plays the recording back
        let out = run(&mut track, 100, 0.0);
        assert_relative_eq!(out[50], 0.5, epsilon = 1e-4);
        assert_eq!(track.frame(), 1);
    }

    #[test]
    fn test_loop_wraps_at_boundary() {
        let mut track = track(Preset::default());
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 64, 0.5);
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 200, 0.0);
        assert_eq!(track.frame(), 200 % 64);
    }

    #[test]
    fn test_threshold_starts_on_signal() {
        let preset = Preset {
            record_threshold: 4,
            ..Default::default()
        };
        let mut track = track(preset);
        track.invoke(&Action::new(Function::Record));
        assert_eq!(track.mode(), LoopMode::Threshold);
        run(&mut track, 40, 0.0);
        assert_eq!(track.mode(), LoopMode::Threshold);

        let mut input = vec![0.0; 32];
        input[10..].fill(0.9);
        let mut out = vec![0.0; 32];
        track.process(&input, &mut out);
        assert_eq!(track.mode(), LoopMode::Record);
        assert_eq!(track.frame(), 22);
    }

    #[test]
    fn test_sync_pulse_releases_record() {
        let preset = Preset {
            sync_mode: SyncMode::Host,
            ..Default::default()
        };
        let mut track = track(preset);
        track.invoke(&Action::new(Function::Record));
        assert_eq!(track.mode(), LoopMode::Synchronize);
        run(&mut track, 20, 0.5);
        assert_eq!(track.mode(), LoopMode::Synchronize);

        track.sync_pulse();
        run(&mut track, 50, 0.5);
        assert_eq!(track.mode(), LoopMode::Record);
        track.invoke(&Action::new(Function::Record));
        assert!(track.events().find_event(EventType::RecordStop).is_some_and(|e| e.pending));
        run(&mut track, 10, 0.5);
        assert_eq!(track.mode(), LoopMode::Record);
        track.sync_pulse();
        run(&mut track, 1, 0.0);
        assert_eq!(track.mode(), LoopMode::Play);
        assert_eq!(track.frames(), 60);
    }

    #[test]
    fn test_switch_copies_into_empty_loop() {
        let preset = Preset {
            empty_loop_action: strata_core::EmptyLoopAction::CopySound,
            ..Default::default()
        };
        let mut track = track(preset);
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 80, 0.5);
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 10, 0.0);

        track.invoke(&Action::new(Function::NextLoop));
        run(&mut track, 1, 0.0);
        assert_eq!(track.current_loop(), 1);
        assert_eq!(track.frames(), 80);
        assert_eq!(track.mode(), LoopMode::Play);

        let state = track.monitor().snapshot();
        assert_eq!(state.number, 1);
        let summaries = track.monitor().summaries();
        assert!(summaries[1].active);
        assert!(!summaries[0].active);
        assert_eq!(summaries[0].frames, 80);
    }

    #[test]
    fn test_switch_reports_events_left_behind() {
        let mut track = track(Preset::default());
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 80, 0.5);
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 10, 0.0);

        track.events.add(Event::new(EventType::Mute, Function::Mute, 60));
        track.invoke(&Action::new(Function::NextLoop));
        let logs = warnings(|| {
            run(&mut track, 1, 0.0);
        });
        assert_eq!(track.current_loop(), 1);
        assert!(logs.contains("event left behind by switch"), "{logs}");
        assert!(logs.contains("Mute"), "{logs}");
        assert!(track.events.is_empty());
    }

    #[test]
    fn test_next_loop_published_while_pending() {
        let preset = Preset {
            switch_quantize: strata_core::QuantizeMode::Loop,
            ..Default::default()
        };
        let mut track = track(preset);
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 100, 0.5);
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 10, 0.0);
        track.invoke(&Action::new(Function::SelectLoop).arg(2));
        run(&mut track, 10, 0.0);
        assert_eq!(track.monitor().snapshot().next_loop, Some(2));
        assert!(track.monitor().summaries()[2].pending);
    }

    #[test]
    fn test_latency_record_offsets_start() {
        let config = EngineConfig {
            input_latency: 16,
            output_latency: 8,
            ..config()
        };
        let mut track = super::super::Track::new(0, &config, Preset::default());
        track.invoke(&Action::new(Function::Record));
        run(&mut track, 4, 0.5);
        assert_eq!(track.mode(), LoopMode::Record);
        // the input latency is skipped before anything lands in the loop
        assert_eq!(track.frame(), -12);
        run(&mut track, 16, 0.5);
        assert_eq!(track.frame(), 4);
    }

    proptest! {
        #[test]
        fn block_sizes_do_not_change_timing(sizes in prop::collection::vec(1usize..256, 1..24)) {
            let mut track = track(Preset::default());
            track.invoke(&Action::new(Function::Record));
            run(&mut track, 64, 0.5);
            track.invoke(&Action::new(Function::Record));
            run(&mut track, 1, 0.0);

            let mut total = 0;
            for n in &sizes {
                let input = vec![0.0; *n];
                let mut out = vec![0.0; *n];
                track.process(&input, &mut out);
                total += *n as i64;
            }
            prop_assert_eq!(track.frames(), 64);
            prop_assert_eq!(track.frame().rem_euclid(64), (1 + total) % 64);
        }
    }

    #[test]
    fn test_output_is_mixed_not_replaced() {
        let mut track = track(Preset::default());
        let input = vec![0.0; 16];
        let mut out = vec![0.25; 16];
        track.process(&input, &mut out);
        assert!(out.iter().all(|s| (*s - 0.25).abs() < 1e-6));
    }
}
