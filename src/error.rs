//! Centralized error type for the strata umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] strata_core::Error),

    #[error(transparent)]
    Loop(#[from] strata_loop::Error),

    #[cfg(feature = "expr")]
    #[error("Expression: {0}")]
    Expr(#[from] strata_expr::Error),

    #[error("Invalid track number: {0}")]
    InvalidTrack(usize),

    #[error("Action queue full")]
    QueueFull,

    #[error("Engine has shut down")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, Error>;
