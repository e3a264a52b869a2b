//! Error types for strata-core.

use thiserror::Error;

/// Error type for strata-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    #[error("Invalid channel count: {0}. Must be between 1 and 8")]
    InvalidChannels(usize),

    #[error("Invalid latency: {0} frames")]
    InvalidLatency(usize),

    #[error("Sample count {samples} is not a multiple of {channels} channels")]
    MisalignedSamples { samples: usize, channels: usize },

    #[cfg(feature = "serde-json")]
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
