//! Record, overdub, multiply and undo scenarios.

use strata::prelude::*;

use crate::helpers::tolerances::{FLOAT_EPSILON, MIX_EPSILON};
use crate::helpers::*;

const LATENCY: usize = 256;
const LOOP: usize = 4096;

/// Overdub over the first 512 frames of a loop recorded with latency compensation.
#[test]
fn test_record_overdub_round_trip_with_latency() {
    let mut engine = test_engine(1, LATENCY, LATENCY);
    let mut clock = 0;

    engine.invoke(Action::new(Function::Record)).unwrap();
    run_signal(&mut engine, &mut clock, LOOP, waveform);
    // the stop lands after the input latency, exactly LOOP frames into the loop
    engine.invoke(Action::new(Function::Record)).unwrap();
    run_signal(&mut engine, &mut clock, LATENCY, waveform);
    run_signal(&mut engine, &mut clock, LOOP - LATENCY, |_| 0.0);

    let track = engine.track(0).unwrap();
    assert_eq!(track.mode(), LoopMode::Play);
    assert_eq!(track.frames(), LOOP as i64);
    assert_eq!(track.frame(), (LOOP - LATENCY) as i64);
    let original = track.play_audio().unwrap().clone();
    // input heard at time t lands at loop frame t - latency
    for k in (64..LOOP - 64).step_by(61) {
        let expected = waveform(k + LATENCY);
        assert!(
            (original.frame(k)[0] - expected).abs() < FLOAT_EPSILON,
            "frame {k}: {} != {expected}",
            original.frame(k)[0]
        );
    }

    // overdub on at loop frame 0, off at 512
    engine.invoke(Action::new(Function::Overdub)).unwrap();
    run_signal(&mut engine, &mut clock, LATENCY, |_| 0.0);
    run_signal(&mut engine, &mut clock, LATENCY, |_| 0.25);
    assert_eq!(engine.track(0).unwrap().mode(), LoopMode::Overdub);
    engine.invoke(Action::new(Function::Overdub)).unwrap();
    run_signal(&mut engine, &mut clock, LATENCY, |_| 0.25);
    // finish the pass so the overdub is committed
    run_signal(&mut engine, &mut clock, LOOP - 512 + 1, |_| 0.0);

    let track = engine.track(0).unwrap();
    assert_eq!(track.mode(), LoopMode::Play);
    assert_eq!(track.frames(), LOOP as i64);
    assert_eq!(track.layer_count(), 2);
    let layered = track.play_audio().unwrap();
    for k in 32..480 {
        let added = layered.frame(k)[0] - original.frame(k)[0];
        assert!((added - 0.25).abs() < MIX_EPSILON, "frame {k} gained {added}");
    }
    for k in 600..LOOP - 64 {
        assert!(
            (layered.frame(k)[0] - original.frame(k)[0]).abs() < FLOAT_EPSILON,
            "frame {k} changed"
        );
    }
}

#[test]
fn test_multiply_then_undo() {
    let mut engine = test_engine(1, 0, 0);
    let handle = engine.handle();
    record_loop(&mut engine, 0, 1000, 0.5);
    run(&mut engine, 999, 0.0);
    assert_eq!(engine.track(0).unwrap().frame(), 1000);

    // starts on the loop boundary, i.e. frame 0
    engine.invoke(Action::new(Function::Multiply)).unwrap();
    run(&mut engine, 2500, 0.0);
    assert_eq!(engine.track(0).unwrap().mode(), LoopMode::Multiply);
    assert_eq!(engine.track(0).unwrap().frame(), 2500);

    engine.invoke(Action::new(Function::Multiply)).unwrap();
    run(&mut engine, 600, 0.0);
    let track = engine.track(0).unwrap();
    assert_eq!(track.mode(), LoopMode::Play);
    assert_eq!(track.frames(), 3000);
    assert_eq!(track.cycles(), 3);
    assert_eq!(track.layer_count(), 2);

    engine.invoke(Action::new(Function::Undo)).unwrap();
    run(&mut engine, 1, 0.0);
    let track = engine.track(0).unwrap();
    assert_eq!(track.frames(), 1000);
    assert_eq!(track.cycles(), 1);
    assert_eq!(track.layer_count(), 1);
    let state = handle.track_state(0).unwrap();
    assert_eq!(state.redo_count, 1);

    engine.invoke(Action::new(Function::Redo)).unwrap();
    run(&mut engine, 1, 0.0);
    assert_eq!(engine.track(0).unwrap().frames(), 3000);
    assert_eq!(engine.track(0).unwrap().cycles(), 3);
}

#[test]
fn test_undo_during_first_recording_resets() {
    let mut engine = test_engine(1, 0, 0);
    engine.invoke(Action::new(Function::Record)).unwrap();
    run(&mut engine, 300, 0.5);
    engine.invoke(Action::new(Function::Undo)).unwrap();
    run(&mut engine, 10, 0.5);
    let track = engine.track(0).unwrap();
    assert_eq!(track.mode(), LoopMode::Reset);
    assert!(track.is_empty());
}

#[test]
fn test_reset_clears_loop() {
    let mut engine = test_engine(1, 0, 0);
    record_loop(&mut engine, 0, 200, 0.5);
    engine.invoke(Action::new(Function::Reset)).unwrap();
    let out = run(&mut engine, 64, 0.0);
    let track = engine.track(0).unwrap();
    assert!(track.is_empty());
    assert_eq!(track.frames(), 0);
    assert!(peak(&out[32..]) < crate::helpers::tolerances::SILENCE_THRESHOLD);
}
