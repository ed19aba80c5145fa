//! Operation mode — global write-permission state.
//!
//! Mutated only by explicit user action; read by the tool-execution gate
//! before every write-class call. Passed around as an explicit
//! [`ModeHandle`] so multiple engine instances (subagents included) can hold
//! independent or intentionally shared state.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Name of the tool that exits planning mode. Always allowed, even while
/// other write-class tools are rejected.
pub const EXIT_PLANNING_TOOL: &str = "exit_planning_mode";

/// Write-permission state for the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationMode {
    /// Writes require normal approval flow.
    #[default]
    Normal,
    /// Writes proceed without confirmation.
    AutoApprove,
    /// Write-class tools are rejected outright.
    Planning,
}

/// Shared handle to the operation mode.
#[derive(Clone, Default)]
pub struct ModeHandle {
    inner: Arc<Mutex<OperationMode>>,
}

impl ModeHandle {
    /// Create a handle starting in the given mode.
    #[must_use]
    pub fn new(mode: OperationMode) -> Self {
        Self {
            inner: Arc::new(Mutex::new(mode)),
        }
    }

    /// Read the current mode.
    #[must_use]
    pub fn get(&self) -> OperationMode {
        *self.inner.lock()
    }

    /// Set the mode (explicit user action only).
    pub fn set(&self, mode: OperationMode) {
        *self.inner.lock() = mode;
    }

    /// Whether a write-class tool call is permitted right now.
    ///
    /// In planning mode only the mode-exit tool is allowed through.
    #[must_use]
    pub fn allows_write(&self, tool_name: &str) -> bool {
        match self.get() {
            OperationMode::Normal | OperationMode::AutoApprove => true,
            OperationMode::Planning => tool_name == EXIT_PLANNING_TOOL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_normal() {
        let handle = ModeHandle::default();
        assert_eq!(handle.get(), OperationMode::Normal);
    }

    #[test]
    fn set_and_get() {
        let handle = ModeHandle::new(OperationMode::Normal);
        handle.set(OperationMode::Planning);
        assert_eq!(handle.get(), OperationMode::Planning);
    }

    #[test]
    fn planning_blocks_writes_except_exit_tool() {
        let handle = ModeHandle::new(OperationMode::Planning);
        assert!(!handle.allows_write("edit_file"));
        assert!(!handle.allows_write("bash"));
        assert!(handle.allows_write(EXIT_PLANNING_TOOL));
    }

    #[test]
    fn normal_and_auto_approve_allow_writes() {
        assert!(ModeHandle::new(OperationMode::Normal).allows_write("edit_file"));
        assert!(ModeHandle::new(OperationMode::AutoApprove).allows_write("edit_file"));
    }

    #[test]
    fn clones_share_state() {
        let a = ModeHandle::default();
        let b = a.clone();
        a.set(OperationMode::AutoApprove);
        assert_eq!(b.get(), OperationMode::AutoApprove);
    }

    #[test]
    fn mode_serde_kebab_case() {
        assert_eq!(
            serde_json::to_string(&OperationMode::AutoApprove).unwrap(),
            "\"auto-approve\""
        );
    }
}
