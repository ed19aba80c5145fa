//! Transcript types.
//!
//! Two parallel transcripts exist during a turn:
//!
//! - **[`ConversationMessage`]**: what the model sees. Append-only; never
//!   mutated after append.
//! - **[`ChatEntry`]**: what the UI sees. A superset — tool-call entries are
//!   upgraded in place to tool-result entries once execution completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// ConversationMessage
// ─────────────────────────────────────────────────────────────────────────────

/// Role of a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions (including injected context bundles).
    System,
    /// End-user input (including synthetic verification feedback).
    User,
    /// Model output.
    Assistant,
    /// Tool execution result, correlated by `tool_call_id`.
    Tool,
}

/// One turn in the model-facing transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    /// Message role.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Tool calls requested by an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Correlation id for `Role::Tool` messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationMessage {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a plain assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message carrying tool calls.
    #[must_use]
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// Create a tool-result message correlated to a call id.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ToolCall / ToolResult
// ─────────────────────────────────────────────────────────────────────────────

/// A model-requested action. Consumed exactly once per round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Call id, unique within a turn.
    pub id: String,
    /// Function name.
    pub name: String,
    /// Serialized JSON argument string, exactly as streamed.
    pub arguments: String,
}

impl ToolCall {
    /// Create a tool call.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Operation class of a tool, used by the verification gate and the
/// planning-mode write gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOperation {
    /// Read a file or other resource.
    View,
    /// Search the workspace.
    Search,
    /// Modify an existing file.
    Edit,
    /// Create a new file.
    Create,
    /// Delete a file.
    Delete,
    /// Run a shell command.
    Execute,
}

impl ToolOperation {
    /// Whether this operation leaves the workspace untouched.
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::View | Self::Search)
    }
}

/// Outcome of executing a [`ToolCall`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Whether the tool executed successfully.
    pub success: bool,
    /// Tool output on success, error description on failure.
    pub output: String,
    /// File the tool touched, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Operation class, if the tool reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<ToolOperation>,
}

impl ToolResult {
    /// Successful result with output text.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            file_path: None,
            operation: None,
        }
    }

    /// Failed result with an error description.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
            file_path: None,
            operation: None,
        }
    }

    /// Attach the touched file path.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Attach the operation class.
    #[must_use]
    pub fn with_operation(mut self, op: ToolOperation) -> Self {
        self.operation = Some(op);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChatEntry
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a UI-facing chat entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEntryKind {
    /// User input.
    User,
    /// Assistant text.
    Assistant,
    /// A tool call awaiting execution.
    ToolCall,
    /// A tool call whose execution has completed.
    ToolResult,
    /// Terminal error for the turn.
    Error,
    /// Explicit notice (round limit, cancellation).
    Notice,
}

/// One turn in the UI-facing transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    /// Entry kind.
    pub kind: ChatEntryKind,
    /// Display content.
    pub content: String,
    /// Creation timestamp.
    pub timestamp: DateTime<Utc>,
    /// The requested call, for `ToolCall`/`ToolResult` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// The execution outcome, for `ToolResult` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
}

impl ChatEntry {
    /// Create an entry with the current timestamp.
    #[must_use]
    pub fn new(kind: ChatEntryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            tool_call: None,
            tool_result: None,
        }
    }

    /// Create a pending tool-call entry.
    #[must_use]
    pub fn pending_tool_call(call: ToolCall) -> Self {
        let mut entry = Self::new(ChatEntryKind::ToolCall, format!("Running {}", call.name));
        entry.tool_call = Some(call);
        entry
    }

    /// Upgrade a pending tool-call entry in place to a tool-result entry.
    ///
    /// No-op for entries of any other kind.
    pub fn upgrade_to_result(&mut self, result: ToolResult) {
        if self.kind != ChatEntryKind::ToolCall {
            return;
        }
        self.kind = ChatEntryKind::ToolResult;
        self.content = if result.success {
            result.output.clone()
        } else {
            format!("Error: {}", result.output)
        };
        self.tool_result = Some(result);
    }
}
