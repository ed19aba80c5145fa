//! Error types shared across the foundation crate.

use thiserror::Error;

/// Errors from foundation-type operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A transcript message or event failed to serialize.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A value was outside its permitted range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field that failed validation.
        field: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl CoreError {
    /// Short category string for logging and event payloads.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "serialization",
            Self::InvalidValue { .. } => "validation",
        }
    }
}
