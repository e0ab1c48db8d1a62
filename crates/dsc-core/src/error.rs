//! # Error Types
//!
//! Errors raised by the foundational types themselves. Domain crates define
//! their own `thiserror` enums and wrap these where needed.

use thiserror::Error;

/// Top-level error type for the foundational types.
#[derive(Error, Debug)]
pub enum DscError {
    /// An identifier failed validation (empty, malformed UUID, ...).
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A timestamp string could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
