//! Runtime error taxonomy and turn stop reasons.
//!
//! Tool failures are never errors here; they are contained per call as
//! `ToolResult { success: false }`. This enum covers the failures that
//! terminate a turn.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tandem_llm::backend::BackendError;

/// Errors that terminate a turn.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A turn was started while another is in flight.
    #[error("engine is already running")]
    Busy,

    /// The model backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The turn was cancelled by the user.
    #[error("turn cancelled")]
    Cancelled,

    /// Invariant violation inside the engine.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Short category string for failure events and logs.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::Backend(e) => e.category(),
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the next user turn can reasonably be expected to work.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Busy | Self::Cancelled => true,
            Self::Backend(e) => e.is_recoverable(),
            Self::Internal(_) => false,
        }
    }
}

/// Why a turn stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model produced a final answer.
    #[default]
    EndTurn,
    /// The bounded round counter hit its limit.
    RoundLimit,
    /// A turn-level error terminated the turn.
    Error,
    /// The user cancelled mid-turn.
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EndTurn => "end_turn",
            Self::RoundLimit => "round_limit",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
