//! Track level functions and cross-track operations.

use strata::prelude::*;
use strata::BounceMode;

use crate::helpers::tolerances::SILENCE_THRESHOLD;
use crate::helpers::*;

#[test]
fn test_mute_silences_and_restores() {
    let mut engine = test_engine(1, 0, 0);
    record_loop(&mut engine, 0, 64, 0.5);
    let out = run(&mut engine, 128, 0.0);
    assert!(peak(&out) > 0.4);

    engine.invoke(Action::new(Function::Mute)).unwrap();
    let out = run(&mut engine, 128, 0.0);
    assert!(engine.track(0).unwrap().is_mute());
    assert_eq!(engine.track(0).unwrap().mode(), LoopMode::Mute);
    assert!(peak(&out[64..]) < SILENCE_THRESHOLD);

    engine.invoke(Action::new(Function::Mute)).unwrap();
    let out = run(&mut engine, 128, 0.0);
    assert!(!engine.track(0).unwrap().is_mute());
    assert_eq!(engine.track(0).unwrap().mode(), LoopMode::Play);
    assert!(peak(&out[64..]) > 0.4);
}

#[test]
fn test_reverse_toggles_direction() {
    let mut engine = test_engine(1, 0, 0);
    let handle = engine.handle();
    record_loop(&mut engine, 0, 100, 0.5);

    engine.invoke(Action::new(Function::Reverse)).unwrap();
    run(&mut engine, 10, 0.0);
    assert!(handle.track_state(0).unwrap().reverse);

    engine.invoke(Action::new(Function::Reverse)).unwrap();
    run(&mut engine, 10, 0.0);
    assert!(!handle.track_state(0).unwrap().reverse);
    assert_eq!(engine.track(0).unwrap().frames(), 100);
}

#[test]
fn test_track_copy_timing() {
    let mut engine = test_engine(2, 0, 0);
    record_loop(&mut engine, 0, 120, 0.5);
    engine.select_track(1).unwrap();
    engine.invoke(Action::new(Function::TrackCopyTiming)).unwrap();
    run(&mut engine, 1, 0.0);

    let source = engine.track(0).unwrap();
    let target = engine.track(1).unwrap();
    assert_eq!(target.frames(), 120);
    assert_eq!(target.mode(), LoopMode::Run);
    assert_eq!(target.frame(), source.frame());
    assert_eq!(target.play_audio().unwrap().peak(), 0.0);
}

#[test]
fn test_track_copy_needs_two_tracks() {
    let mut engine = test_engine(1, 0, 0);
    record_loop(&mut engine, 0, 32, 0.5);
    engine.invoke(Action::new(Function::TrackCopySound)).unwrap();
    run(&mut engine, 1, 0.0);
    assert_eq!(engine.track(0).unwrap().frames(), 32);
    assert_eq!(engine.track(0).unwrap().layer_count(), 1);
}

#[test]
fn test_bounce_mutes_sources_from_another_thread() {
    let mut engine = test_engine(3, 0, 0);
    let handle = engine.handle();
    record_loop(&mut engine, 0, 64, 0.5);
    record_loop(&mut engine, 1, 64, 0.25);
    // line the two loops up on frame 0 before bouncing
    run(&mut engine, 63, 0.0);
    engine.track_mut(0).unwrap().set_preset(Preset {
        bounce_mode: BounceMode::Mute,
        ..Default::default()
    });

    handle.invoke(Action::new(Function::Bounce)).unwrap();
    run(&mut engine, 64, 0.0);
    assert!(engine.is_bouncing());
    handle.invoke(Action::new(Function::Bounce)).unwrap();
    run(&mut engine, 1, 0.0);
    assert!(!engine.is_bouncing());

    assert!(engine.track(0).unwrap().is_mute());
    assert!(engine.track(1).unwrap().is_mute());
    let target = engine.track(2).unwrap();
    assert_eq!(target.frames(), 64);
    assert!(target.play_audio().unwrap().peak() > 0.5);
}
