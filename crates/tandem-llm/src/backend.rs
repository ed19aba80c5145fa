//! Language-model backend contract.
//!
//! The engine never talks to a model directly; it consumes this interface.
//! Streaming responses arrive as [`StreamDelta`] chunks, each carrying a
//! partial content fragment and/or a partial tool-call list fragment, merged
//! by [`crate::merge::merge_delta`].

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tandem_core::messages::ConversationMessage;

/// A pinned, boxed stream of deltas from a backend.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta, BackendError>> + Send>>;

/// Tool made available to the model for a request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Function name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: serde_json::Value,
}

/// One partial chunk of a streaming response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDelta {
    /// Partial assistant text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Partial tool-call list fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

impl StreamDelta {
    /// A pure text fragment.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: None,
        }
    }
}

/// A partial tool-call entry within a delta.
///
/// `index` is a transient wire marker; the merge rule drops it when a new
/// list element is adopted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallDelta {
    /// Position marker from the wire, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Call id fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function name fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument JSON text fragment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Errors from a model backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The API returned an error status.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP-ish status code.
        status: u16,
        /// Error message from the backend.
        message: String,
        /// Whether a retry might succeed.
        retryable: bool,
    },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The backend emitted something the delta types cannot represent.
    #[error("malformed delta: {0}")]
    MalformedDelta(String),

    /// The stream was cancelled by the caller.
    #[error("stream cancelled")]
    Cancelled,
}

impl BackendError {
    /// Short category string for logging and failure events.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api",
            Self::Network(_) => "network",
            Self::MalformedDelta(_) => "malformed_delta",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether retrying the request might succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Api { retryable, .. } => *retryable,
            Self::Network(_) => true,
            Self::MalformedDelta(_) | Self::Cancelled => false,
        }
    }
}

/// External language-model contract consumed by the engine.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// One-shot completion.
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolSpec],
    ) -> Result<ConversationMessage, BackendError>;

    /// Streaming completion. Each yielded delta follows the merge semantics
    /// of [`crate::merge::merge_delta`].
    async fn stream_complete(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolSpec],
    ) -> Result<DeltaStream, BackendError>;
}
