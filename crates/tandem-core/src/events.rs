//! Engine lifecycle events.
//!
//! [`EngineEvent`] is broadcast to UI subscribers as the engine works through
//! a turn: stream deltas, tool execution boundaries, verification outcomes,
//! and subagent lifecycle. Events are transient — never persisted.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::messages::{ToolCall, ToolResult};

const DEFAULT_CAPACITY: usize = 256;

/// Common fields for all engine events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Engine/session this event belongs to.
    pub session_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// High-level engine event with session context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum EngineEvent {
    /// A user turn started.
    TurnStart {
        #[serde(flatten)]
        base: BaseEvent,
    },
    /// A visible fragment of streamed assistant text.
    TextDelta {
        #[serde(flatten)]
        base: BaseEvent,
        delta: String,
    },
    /// One tool round is about to execute.
    RoundStart {
        #[serde(flatten)]
        base: BaseEvent,
        round: u32,
        tool_call_count: u32,
    },
    /// Tool execution started.
    ToolExecutionStart {
        #[serde(flatten)]
        base: BaseEvent,
        tool_call: ToolCall,
    },
    /// Tool execution finished.
    ToolExecutionEnd {
        #[serde(flatten)]
        base: BaseEvent,
        tool_call_id: String,
        result: ToolResult,
        duration_ms: u64,
    },
    /// Verification completed for a tool result.
    VerificationCompleted {
        #[serde(flatten)]
        base: BaseEvent,
        passed: bool,
        feedback: Option<String>,
    },
    /// A subagent was spawned.
    SubagentSpawned {
        #[serde(flatten)]
        base: BaseEvent,
        instruction: String,
    },
    /// A subagent finished (success or failure).
    SubagentFinished {
        #[serde(flatten)]
        base: BaseEvent,
        success: bool,
        duration_ms: u64,
    },
    /// The turn ended normally.
    TurnEnd {
        #[serde(flatten)]
        base: BaseEvent,
        rounds: u32,
        duration_ms: u64,
    },
    /// The turn ended with a terminal error.
    TurnFailed {
        #[serde(flatten)]
        base: BaseEvent,
        error: String,
        category: String,
        recoverable: bool,
    },
    /// The turn was cancelled by the user.
    TurnCancelled {
        #[serde(flatten)]
        base: BaseEvent,
    },
}

impl EngineEvent {
    /// Get the base event fields.
    #[must_use]
    pub fn base(&self) -> &BaseEvent {
        match self {
            Self::TurnStart { base }
            | Self::TextDelta { base, .. }
            | Self::RoundStart { base, .. }
            | Self::ToolExecutionStart { base, .. }
            | Self::ToolExecutionEnd { base, .. }
            | Self::VerificationCompleted { base, .. }
            | Self::SubagentSpawned { base, .. }
            | Self::SubagentFinished { base, .. }
            | Self::TurnEnd { base, .. }
            | Self::TurnFailed { base, .. }
            | Self::TurnCancelled { base } => base,
        }
    }
}

/// Broadcast emitter for [`EngineEvent`].
///
/// Emission is non-blocking; lagging receivers drop events rather than
/// back-pressuring the engine.
pub struct EventEmitter {
    tx: broadcast::Sender<EngineEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create a new emitter with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Returns the receiver count
    /// (0 when nobody is listening).
    pub fn emit(&self, event: EngineEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of events emitted.
    #[must_use]
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
