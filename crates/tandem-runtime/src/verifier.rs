//! Post-action verification gate.
//!
//! After a successful write-class tool call, runs the configured lint,
//! test, and type checks against the touched file and turns failures into
//! corrective transcript feedback. Checks run external commands; each argv
//! gets the file path appended and is raced against a timeout.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use tandem_core::messages::ToolResult;
use tandem_core::text::truncate_output;

use crate::types::{CheckResult, VerificationConfig, VerificationMode, VerificationResult};

const CHECK_OUTPUT_LIMIT: usize = 4_000;
const MAX_ISSUE_LINES: usize = 20;

/// Runs verification checks after write-class tool calls.
pub struct VerificationGate {
    config: VerificationConfig,
}

impl VerificationGate {
    /// Create a gate with the given configuration.
    #[must_use]
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }

    /// Whether any check could run for this result. Read-only operations,
    /// failed calls, and results without a file path are never verified.
    #[must_use]
    pub fn applies_to(&self, result: &ToolResult) -> bool {
        if self.config.mode == VerificationMode::Off {
            return false;
        }
        if !result.success || result.file_path.is_none() {
            return false;
        }
        result.operation.is_none_or(|op| !op.is_read_only())
    }

    /// Verify one tool result. Returns a pass with no checks when nothing
    /// applies.
    #[instrument(skip(self, result), fields(file = result.file_path.as_deref().unwrap_or("")))]
    pub async fn verify(&self, result: &ToolResult) -> VerificationResult {
        if !self.applies_to(result) {
            return VerificationResult::skipped();
        }
        let Some(path) = result.file_path.as_deref() else {
            return VerificationResult::skipped();
        };

        let started = Instant::now();
        let mut checks = Vec::new();

        if let Some(lint) = &self.config.lint_command {
            if self.is_lintable(path) {
                checks.push(self.run_check("lint", lint, path).await);
            }
        }

        if self.config.mode == VerificationMode::Thorough {
            if self.config.run_tests {
                if let Some(tests) = &self.config.test_command {
                    if let Some(test_file) = find_test_file(path) {
                        checks.push(
                            self.run_check("tests", tests, &test_file.to_string_lossy())
                                .await,
                        );
                    } else {
                        debug!(file = path, "no test file found, skipping test check");
                    }
                }
            }
            if self.config.run_types {
                if let Some(types) = &self.config.types_command {
                    checks.push(self.run_check("types", types, path).await);
                }
            }
        }

        let passed = checks.iter().all(|c| c.passed);
        VerificationResult {
            passed,
            checks,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn is_lintable(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.config.lintable_extensions.iter().any(|e| e == ext))
    }

    /// Run one external check command with the file path appended.
    async fn run_check(&self, name: &str, argv: &[String], path: &str) -> CheckResult {
        let Some((program, args)) = argv.split_first() else {
            return CheckResult {
                name: name.into(),
                passed: false,
                output: "empty check command".into(),
                issues: Vec::new(),
            };
        };

        let mut command = Command::new(program);
        command.args(args).arg(path).kill_on_drop(true);

        let outcome = tokio::time::timeout(self.config.check_timeout, command.output()).await;
        match outcome {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.is_empty() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&stderr);
                }
                let passed = output.status.success();
                let issues = if passed {
                    Vec::new()
                } else {
                    extract_issues(&text)
                };
                CheckResult {
                    name: name.into(),
                    passed,
                    output: truncate_output(&text, CHECK_OUTPUT_LIMIT),
                    issues,
                }
            }
            Ok(Err(e)) => {
                warn!(check = name, error = %e, "check command failed to spawn");
                CheckResult {
                    name: name.into(),
                    passed: false,
                    output: format!("failed to run {program}: {e}"),
                    issues: Vec::new(),
                }
            }
            Err(_) => CheckResult {
                name: name.into(),
                passed: false,
                output: format!(
                    "timed out after {}s",
                    self.config.check_timeout.as_secs()
                ),
                issues: Vec::new(),
            },
        }
    }
}

/// Pull the likely diagnostic lines out of check output.
fn extract_issues(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("error") || lower.contains("warning") || lower.contains("failed")
        })
        .take(MAX_ISSUE_LINES)
        .map(str::to_owned)
        .collect()
}

/// Locate the test file for a source file, checking sibling naming
/// conventions first, then a `tests/` directory beside and above it.
fn find_test_file(path: &str) -> Option<PathBuf> {
    let source = Path::new(path);
    let stem = source.file_stem()?.to_str()?;
    let ext = source.extension()?.to_str()?;
    let dir = source.parent().unwrap_or_else(|| Path::new(""));

    let candidates = [
        dir.join(format!("{stem}.test.{ext}")),
        dir.join(format!("{stem}.spec.{ext}")),
        dir.join(format!("{stem}_test.{ext}")),
        dir.join("tests").join(format!("{stem}.test.{ext}")),
        dir.join("tests").join(format!("{stem}.{ext}")),
        dir.join("__tests__").join(format!("{stem}.test.{ext}")),
    ];
    if let Some(found) = candidates.iter().find(|c| c.is_file()) {
        return Some(found.clone());
    }

    if let Some(parent) = dir.parent() {
        let above = parent.join("tests").join(format!("{stem}.{ext}"));
        if above.is_file() {
            return Some(above);
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
