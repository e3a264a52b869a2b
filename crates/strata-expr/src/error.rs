//! Error types for strata-expr.
//!
//! Only parsing reports errors. Evaluation always produces a value.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Unexpected character '{found}' at {position}")]
    UnexpectedChar { position: usize, found: char },

    #[error("Unterminated string starting at {0}")]
    UnterminatedString(usize),

    #[error("Invalid number '{text}' at {position}")]
    InvalidNumber { position: usize, text: String },

    #[error("Unexpected {found} at {position}")]
    UnexpectedToken { position: usize, found: String },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("{name} takes {expected} arguments, got {found}")]
    Arity {
        name: String,
        expected: &'static str,
        found: usize,
    },
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
