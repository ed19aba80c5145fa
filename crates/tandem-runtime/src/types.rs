//! Configuration and result types for the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tandem_context::budget::TokenBudget;

use crate::errors::StopReason;

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum tool rounds per turn.
    pub max_tool_rounds: u32,
    /// Whether this engine may dispatch sub-agents. Baked in at
    /// construction; sub-agent engines are built with `false`.
    pub can_spawn_subagents: bool,
    /// Tool output above this many chars is truncated before entering the
    /// transcript.
    pub max_tool_output_chars: usize,
    /// Model context window, for budget computation.
    pub context_window: usize,
    /// Fraction of the window reserved for gathered context.
    pub context_reserved_fraction: f64,
    /// Maximum sources per gather pass.
    pub max_context_sources: usize,
    /// Verification settings.
    pub verification: VerificationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 10,
            can_spawn_subagents: true,
            max_tool_output_chars: 30_000,
            context_window: 100_000,
            context_reserved_fraction: 0.3,
            max_context_sources: 20,
            verification: VerificationConfig::default(),
        }
    }
}

/// How aggressively to verify tool effects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    /// No checks run.
    #[default]
    Off,
    /// Lint only.
    Fast,
    /// Lint, plus opt-in tests and type-check.
    Thorough,
}

/// Verification gate configuration. Commands are argv vectors; the touched
/// file path is appended as the final argument.
#[derive(Clone, Debug)]
pub struct VerificationConfig {
    /// Active mode.
    pub mode: VerificationMode,
    /// Lint command, if configured.
    pub lint_command: Option<Vec<String>>,
    /// Test runner command, if configured.
    pub test_command: Option<Vec<String>>,
    /// Type-check command, if configured.
    pub types_command: Option<Vec<String>>,
    /// Opt-in for the test check (thorough mode only).
    pub run_tests: bool,
    /// Opt-in for the type check (thorough mode only).
    pub run_types: bool,
    /// Per-check wall-clock bound.
    pub check_timeout: Duration,
    /// Extensions the lint check applies to.
    pub lintable_extensions: Vec<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            mode: VerificationMode::Off,
            lint_command: None,
            test_command: None,
            types_command: None,
            run_tests: false,
            run_types: false,
            check_timeout: Duration::from_secs(30),
            lintable_extensions: ["rs", "ts", "tsx", "js", "jsx", "py"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Outcome of one verification check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Check name: `lint`, `tests`, or `types`.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Combined stdout/stderr, truncated.
    pub output: String,
    /// Parsed issue lines, if any.
    pub issues: Vec<String>,
}

/// Outcome of the verify phase for one tool result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// AND of every check that ran. `true` when all checks were skipped.
    pub passed: bool,
    /// Checks that actually ran, in order.
    pub checks: Vec<CheckResult>,
    /// Wall-clock duration of the phase.
    pub duration_ms: u64,
}

impl VerificationResult {
    /// A pass with no checks run.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            passed: true,
            checks: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Corrective feedback text for the transcript, present only on failure.
    #[must_use]
    pub fn feedback(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        let mut lines = Vec::new();
        for check in self.checks.iter().filter(|c| !c.passed) {
            lines.push(format!("{} check failed:", check.name));
            if check.issues.is_empty() {
                lines.push(check.output.clone());
            } else {
                lines.extend(check.issues.iter().cloned());
            }
        }
        Some(lines.join("\n"))
    }
}

/// A unit of work delegated to a sub-agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskRequest {
    /// Files the sub-agent should work on.
    pub files: Vec<String>,
    /// Natural-language instruction.
    pub instruction: String,
    /// Tools the sub-agent may use.
    pub tool_whitelist: Vec<String>,
    /// Optional context budget override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<TokenBudget>,
}

/// Outcome of one sub-agent run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentResult {
    /// Whether the sub-agent finished successfully.
    pub success: bool,
    /// Capped summary of the sub-agent's final answer.
    pub summary: String,
    /// Files the sub-agent changed.
    pub files_changed: Vec<String>,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

/// Outcome of one user turn.
#[derive(Clone, Debug, Default)]
pub struct TurnResult {
    /// Tool rounds executed.
    pub rounds: u32,
    /// Why the turn stopped.
    pub stop_reason: StopReason,
    /// Wall-clock duration of the turn.
    pub duration_ms: u64,
    /// Terminal error text, when `stop_reason` is `Error`.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_tool_rounds, 10);
        assert!(config.can_spawn_subagents);
        assert_eq!(config.verification.mode, VerificationMode::Off);
    }

    #[test]
    fn skipped_verification_passes_with_no_checks() {
        let result = VerificationResult::skipped();
        assert!(result.passed);
        assert!(result.checks.is_empty());
        assert!(result.feedback().is_none());
    }

    #[test]
    fn feedback_lists_failing_checks() {
        let result = VerificationResult {
            passed: false,
            checks: vec![
                CheckResult {
                    name: "lint".into(),
                    passed: false,
                    output: "raw".into(),
                    issues: vec!["line 3: unused variable".into()],
                },
                CheckResult {
                    name: "types".into(),
                    passed: true,
                    output: String::new(),
                    issues: vec![],
                },
            ],
            duration_ms: 12,
        };
        let feedback = result.feedback().unwrap();
        assert!(feedback.contains("lint check failed:"));
        assert!(feedback.contains("unused variable"));
        assert!(!feedback.contains("types check failed"));
    }
}
