//! Hook collaborator interface.
//!
//! Hooks live outside the core. The tool gate calls `before_tool` and must
//! honor a block by aborting that step, never by retrying. `after_tool` is
//! observational and fire-and-forget.

use async_trait::async_trait;

use tandem_core::messages::{ToolCall, ToolResult};

/// Verdict from a before-tool hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookDecision {
    /// Execute the tool.
    Proceed,
    /// Abort this step with the given reason.
    Block {
        /// Why the hook refused the call.
        reason: String,
    },
}

/// External hook interface invoked around tool execution.
#[async_trait]
pub trait HookCollaborator: Send + Sync {
    /// Called before a tool executes. A block aborts the step.
    async fn before_tool(&self, call: &ToolCall) -> HookDecision;

    /// Called after a tool executes. Failures are ignored.
    async fn after_tool(&self, call: &ToolCall, result: &ToolResult);
}
