//! Tool-execution gate.
//!
//! Wraps the external tool executor with the checks the loop relies on, in
//! order: before-hook, operation-mode gate, cancellation, execute,
//! after-hook. Tool failures come back as `ToolResult { success: false }`
//! and never propagate as errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tandem_core::messages::{ToolCall, ToolOperation, ToolResult};
use tandem_core::mode::ModeHandle;

use crate::hooks::{HookCollaborator, HookDecision};

const AFTER_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// External tool executor contract. Idempotence for repeated call ids is
/// the tool's responsibility, not the gate's.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute one call. Errors are reported inside the result.
    async fn execute(&self, call: &ToolCall) -> ToolResult;

    /// Operation class of a tool, for mode gating and verification.
    fn operation_of(&self, tool_name: &str) -> ToolOperation;
}

/// Gated access to the tool executor.
pub struct ToolGate {
    executor: Arc<dyn ToolExecutor>,
    hooks: Option<Arc<dyn HookCollaborator>>,
    mode: ModeHandle,
}

impl ToolGate {
    /// Create a gate around an executor.
    #[must_use]
    pub fn new(
        executor: Arc<dyn ToolExecutor>,
        hooks: Option<Arc<dyn HookCollaborator>>,
        mode: ModeHandle,
    ) -> Self {
        Self {
            executor,
            hooks,
            mode,
        }
    }

    /// The operation class the executor reports for a tool.
    #[must_use]
    pub fn operation_of(&self, tool_name: &str) -> ToolOperation {
        self.executor.operation_of(tool_name)
    }

    /// Run one call through the gate.
    pub async fn run(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        if let Some(hooks) = &self.hooks {
            if let HookDecision::Block { reason } = hooks.before_tool(call).await {
                debug!(tool = %call.name, reason = %reason, "tool call blocked by hook");
                return ToolResult::error(format!("Blocked by hook: {reason}"));
            }
        }

        let operation = self.executor.operation_of(&call.name);
        if !operation.is_read_only() && !self.mode.allows_write(&call.name) {
            return ToolResult::error(format!(
                "Tool '{}' is not permitted in planning mode",
                call.name
            ))
            .with_operation(operation);
        }

        if cancel.is_cancelled() {
            return ToolResult::error("Cancelled before execution").with_operation(operation);
        }

        let result = self.executor.execute(call).await;

        if let Some(hooks) = &self.hooks {
            let hooks = hooks.clone();
            let call = call.clone();
            let result_copy = result.clone();
            // Fire-and-forget: a slow or failing after-hook never stalls the loop.
            drop(tokio::spawn(async move {
                if tokio::time::timeout(
                    AFTER_HOOK_TIMEOUT,
                    hooks.after_tool(&call, &result_copy),
                )
                .await
                .is_err()
                {
                    warn!(tool = %call.name, "after-tool hook timed out");
                }
            }));
        }

        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
