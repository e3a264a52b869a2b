//! Expressions over published track state.

use strata::prelude::*;
use strata::Error;

use crate::helpers::*;

#[test]
fn test_eval_reads_loop_state() {
    let mut engine = test_engine(2, 0, 0);
    let handle = engine.handle();
    record_loop(&mut engine, 1, 400, 0.5);

    assert_eq!(handle.eval(1, "loopFrames / 2").unwrap(), Value::Int(200));
    assert_eq!(handle.eval(1, "mode == 'play'").unwrap(), Value::Bool(true));
    assert_eq!(handle.eval(1, "trackNumber").unwrap(), Value::Int(2));
    assert_eq!(handle.eval(0, "mode").unwrap(), Value::from("Reset"));
    assert_eq!(
        handle.eval(0, "loopFrames > 0 ? 'busy' : 'empty'").unwrap(),
        Value::from("empty")
    );
}

#[test]
fn test_eval_errors() {
    let engine = test_engine(1, 0, 0);
    let handle = engine.handle();
    assert!(matches!(handle.eval(0, "loopFrames +"), Err(Error::Expr(_))));
    assert!(matches!(handle.eval(0, "sqrt(4)"), Err(Error::Expr(_))));
    assert!(matches!(handle.eval(3, "1"), Err(Error::InvalidTrack(3))));
    // numeric faults are not errors
    assert_eq!(handle.eval(0, "loopFrames % 0").unwrap(), Value::Int(0));
}

#[test]
fn test_locals_persist_across_expressions() {
    let mut engine = test_engine(1, 0, 0);
    let handle = engine.handle();
    record_loop(&mut engine, 0, 300, 0.5);

    let mut vars = handle.variables(0).unwrap();
    Expr::parse("half = loopFrames / 2").unwrap().eval(&mut vars);
    let value = Expr::parse("half + cycleCount").unwrap().eval(&mut vars);
    assert_eq!(value, Value::Int(151));
}
