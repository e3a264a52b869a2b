//! Loop state exposed to expressions.

use std::collections::HashMap;

use strata_expr::{Expr, Value, Variables};
use strata_loop::LoopState;

use crate::{EngineHandle, Result};

/// Read-only loop variables of one track plus writable locals.
///
/// Names follow the script conventions: `mode`, `loopNumber` (1-based),
/// `loopFrames`, `loopFrame`, `cycleNumber`, `cycleCount`, `layerCount`, `redoCount`,
/// `nextLoop`, `returnLoop`, `trackNumber`, `speed`, `pitch`, and the flags `isMuted`,
/// `isPaused`, `isReverse`, `isRecording`, `inOverdub`.
#[derive(Debug, Clone, Default)]
pub struct TrackVariables {
    track: usize,
    state: LoopState,
    locals: HashMap<String, Value>,
}

impl TrackVariables {
    pub fn new(track: usize, state: LoopState) -> Self {
        Self {
            track,
            state,
            locals: HashMap::new(),
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    fn loop_variable(&self, name: &str) -> Option<Value> {
        let s = &self.state;
        let value = match name {
            "mode" => Value::from(s.mode.name()),
            "loopNumber" => Value::from(s.number + 1),
            "loopFrames" => Value::from(s.frames),
            "loopFrame" => Value::from(s.frame),
            "cycleNumber" => Value::from(s.cycle),
            "cycleCount" => Value::from(s.cycles),
            "layerCount" => Value::from(s.layer_count),
            "redoCount" => Value::from(s.redo_count),
            "nextLoop" => s.next_loop.map_or(Value::Null, |n| Value::from(n + 1)),
            "returnLoop" => s.return_loop.map_or(Value::Null, |n| Value::from(n + 1)),
            "trackNumber" => Value::from(self.track + 1),
            "speed" => Value::from(s.speed),
            "pitch" => Value::from(s.pitch),
            "isMuted" => Value::from(s.mute),
            "isPaused" => Value::from(s.pause),
            "isReverse" => Value::from(s.reverse),
            "isRecording" => Value::from(s.recording),
            "inOverdub" => Value::from(s.overdub),
            _ => return None,
        };
        Some(value)
    }
}

impl Variables for TrackVariables {
    fn get(&self, name: &str) -> Option<Value> {
        self.locals
            .get(name)
            .cloned()
            .or_else(|| self.loop_variable(name))
    }

    fn set(&mut self, name: &str, value: Value) -> bool {
        if self.loop_variable(name).is_some() {
            return false;
        }
        self.locals.insert(name.to_string(), value);
        true
    }
}

impl EngineHandle {
    /// Variables over the latest published state of `track`.
    pub fn variables(&self, track: usize) -> Result<TrackVariables> {
        Ok(TrackVariables::new(track, self.track_state(track)?))
    }

    /// Parses and evaluates `source` against `track`'s state.
    pub fn eval(&self, track: usize, source: &str) -> Result<Value> {
        let expr = Expr::parse(source)?;
        let mut vars = self.variables(track)?;
        Ok(expr.eval(&mut vars))
    }
}
