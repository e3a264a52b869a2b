//! Loop switching scenarios.

use strata::prelude::*;
use strata::{EmptyLoopAction, SwitchDuration};

use crate::helpers::*;

#[test]
fn test_empty_loop_record_starts_immediately() {
    let mut engine = test_engine_with(
        1,
        Preset {
            empty_loop_action: EmptyLoopAction::Record,
            ..Default::default()
        },
    );
    let handle = engine.handle();
    record_loop(&mut engine, 0, 100, 0.5);

    engine.invoke(Action::new(Function::NextLoop)).unwrap();
    run(&mut engine, 1, 0.0);
    // the first state published after the switch is already recording
    let state = handle.track_state(0).unwrap();
    assert_eq!(state.number, 1);
    assert_eq!(state.mode, LoopMode::Record);

    run(&mut engine, 50, 0.5);
    let track = engine.track(0).unwrap();
    assert_eq!(track.current_loop(), 1);
    assert_eq!(track.mode(), LoopMode::Record);
    assert!(track.frame() > 0);
}

#[test]
fn test_switch_and_return() {
    let mut engine = test_engine_with(
        1,
        Preset {
            empty_loop_action: EmptyLoopAction::CopySound,
            switch_duration: SwitchDuration::OnceReturn,
            ..Default::default()
        },
    );
    let handle = engine.handle();
    record_loop(&mut engine, 0, 48, 0.5);

    engine.invoke(Action::new(Function::NextLoop)).unwrap();
    run(&mut engine, 1, 0.0);
    assert_eq!(engine.track(0).unwrap().current_loop(), 1);
    assert_eq!(engine.track(0).unwrap().frames(), 48);
    assert_eq!(handle.track_state(0).unwrap().return_loop, Some(0));

    // once through the copy, then back
    run(&mut engine, 60, 0.0);
    assert_eq!(engine.track(0).unwrap().current_loop(), 0);
    assert_eq!(engine.track(0).unwrap().frames(), 48);
}

#[test]
fn test_switch_to_empty_loop_resets_by_default() {
    let mut engine = test_engine(1, 0, 0);
    record_loop(&mut engine, 0, 64, 0.5);
    engine
        .invoke(Action::new(Function::SelectLoop).arg(2))
        .unwrap();
    run(&mut engine, 8, 0.0);

    let track = engine.track(0).unwrap();
    assert_eq!(track.current_loop(), 2);
    assert!(track.is_empty());
    // the loop left behind keeps its content
    assert!(track.get_loop(0).unwrap().play_layer().is_some());
}

#[test]
fn test_loop_summaries_follow_switches() {
    let mut engine = test_engine_with(
        1,
        Preset {
            empty_loop_action: EmptyLoopAction::CopyTiming,
            ..Default::default()
        },
    );
    let handle = engine.handle();
    record_loop(&mut engine, 0, 80, 0.5);
    engine.invoke(Action::new(Function::PrevLoop)).unwrap();
    run(&mut engine, 4, 0.0);

    let summaries = handle.loop_summaries(0).unwrap();
    assert_eq!(summaries.len(), 4);
    assert!(summaries[3].active);
    assert_eq!(summaries[3].mode, LoopMode::Run);
    assert_eq!(summaries[3].frames, 80);
    assert!(!summaries[0].active);
    assert_eq!(summaries[0].frames, 80);
}
