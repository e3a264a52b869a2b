//! Error types for strata-loop.
//!
//! Only non-realtime entry points return these. Anomalies inside the audio callback are
//! logged and repaired in place.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] strata_core::Error),

    #[error("Invalid loop number: {0}")]
    InvalidLoop(usize),

    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("Channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
