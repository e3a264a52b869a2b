//! # Strata - Real-time Live Looping Engine
//!
//! Multi-track looper built from modular subsystems.
//!
//! ## Architecture
//!
//! Strata is an umbrella crate that coordinates:
//! - **strata-core** - Audio storage, fades, smoothing, configuration and presets
//! - **strata-loop** - Layers, loops, events, modes and the per-track interrupt
//! - **strata-expr** - Expressions over loop and track state
//!
//! The [`StrataEngine`] is owned by the audio thread and processed once per interrupt.
//! Other threads drive it through an [`EngineHandle`]: actions travel over a bounded
//! queue and loop state comes back through lock-free monitors.
//!
//! ## Quick Start
//!
//! ```ignore
//! use strata::prelude::*;
//!
//! let mut engine = StrataEngine::builder()
//!     .sample_rate(48000)
//!     .tracks(2)
//!     .build()?;
//!
//! // Control thread
//! let handle = engine.handle();
//! handle.invoke(Action::new(Function::Record))?;
//!
//! // Audio thread, once per interrupt
//! engine.process(&input, &mut output);
//!
//! let state = handle.track_state(0)?;
//! println!("{} at {}/{}", state.mode.name(), state.frame, state.frames);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Looping engine with expressions
//! - `expr` - Expression evaluation against track state
//! - `serde` - JSON helpers for configuration and presets

/// Re-export of strata-core for direct access
pub use strata_core as core;

/// Re-export of strata-loop for direct access
pub use strata_loop as looping;

// Core types
pub use strata_core::{
    Audio,

    // Presets
    BounceMode,
    EmptyLoopAction,

    // Configuration
    EngineConfig,
    MultiplyMode,
    MuteMode,
    Preset,
    QuantizeMode,
    SwitchDuration,
    SwitchLocation,
    SyncMode,
    TransferMode,
};

// Loops and tracks
pub use strata_loop::{
    Action, Function, LoopMode, LoopState, LoopSummary, NullSync, PitchShifter, ProjectLayer,
    SyncListener, Track, TrackMonitor,
};

// Expressions
#[cfg(feature = "expr")]
pub use strata_expr as expr;

#[cfg(feature = "expr")]
pub use strata_expr::{Expr, Value, Variables};

mod builder;
mod engine;
mod error;

#[cfg(feature = "expr")]
mod variables;

pub use builder::StrataEngineBuilder;
pub use engine::{Command, EngineHandle, StrataEngine};
pub use error::{Error, Result};

#[cfg(feature = "expr")]
pub use variables::TrackVariables;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{EngineHandle, StrataEngine, StrataEngineBuilder};

    // Driving loops
    pub use crate::{Action, Function, LoopMode, LoopState};

    // Settings
    pub use crate::{EngineConfig, Preset};

    // Expressions
    #[cfg(feature = "expr")]
    pub use crate::{Expr, Value};
}
