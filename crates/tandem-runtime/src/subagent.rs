//! Sub-agent dispatch.
//!
//! A sub-agent is a fresh engine built by an [`EngineFactory`] for one
//! [`SubtaskRequest`]: its own transcript, a restricted tool set, and no
//! ability to delegate further. Each run is raced against a timeout.
//! Parallel dispatch splits the requests into at most `concurrency_cap`
//! batches; batches run strictly one after another, requests within a batch
//! run concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use tandem_core::events::{BaseEvent, EngineEvent, EventEmitter};
use tandem_core::text::{CHARS_PER_TOKEN, truncate_output};

use crate::engine::ConversationEngine;
use crate::errors::StopReason;
use crate::types::{SubagentResult, SubtaskRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CONCURRENCY_CAP: usize = 3;
const SUMMARY_TOKEN_LIMIT: usize = 500;

/// Builds an engine for one subtask. Implementations must bake in the
/// restrictions: sub-agent engines cannot spawn sub-agents of their own and
/// see only the whitelisted tools.
pub trait EngineFactory: Send + Sync {
    /// Build a fresh engine configured for this subtask.
    fn build(&self, request: &SubtaskRequest) -> ConversationEngine;
}

/// Dispatches subtasks to isolated sub-engines.
pub struct SubagentDispatcher {
    factory: Arc<dyn EngineFactory>,
    emitter: Arc<EventEmitter>,
    session_id: String,
    can_spawn: bool,
    timeout: Duration,
    concurrency_cap: usize,
}

impl SubagentDispatcher {
    /// Create a dispatcher. `can_spawn` comes from the owning engine's
    /// configuration; a dispatcher owned by a sub-agent gets `false`.
    #[must_use]
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        emitter: Arc<EventEmitter>,
        session_id: impl Into<String>,
        can_spawn: bool,
    ) -> Self {
        Self {
            factory,
            emitter,
            session_id: session_id.into(),
            can_spawn,
            timeout: DEFAULT_TIMEOUT,
            concurrency_cap: DEFAULT_CONCURRENCY_CAP,
        }
    }

    /// Override the per-subtask timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the parallel-dispatch concurrency cap.
    #[must_use]
    pub fn with_concurrency_cap(mut self, cap: usize) -> Self {
        self.concurrency_cap = cap.max(1);
        self
    }

    /// Run one subtask to completion in an isolated engine.
    pub async fn spawn(&self, request: &SubtaskRequest) -> SubagentResult {
        if !self.can_spawn {
            return SubagentResult {
                success: false,
                summary: "refused: sub-agents cannot spawn nested sub-agents".into(),
                files_changed: Vec::new(),
                duration_ms: 0,
            };
        }

        let _ = self.emitter.emit(EngineEvent::SubagentSpawned {
            base: BaseEvent::now(&self.session_id),
            instruction: request.instruction.clone(),
        });
        let started = Instant::now();

        let mut engine = self.factory.build(request);
        let prompt = build_subagent_prompt(request);
        let result = match tokio::time::timeout(self.timeout, engine.run_turn(&prompt)).await {
            Ok(Ok(turn)) => {
                let success = turn.stop_reason == StopReason::EndTurn;
                SubagentResult {
                    success,
                    summary: summarize(&engine, &turn.error),
                    files_changed: files_changed(&engine),
                    duration_ms: elapsed_ms(started),
                }
            }
            Ok(Err(e)) => SubagentResult {
                success: false,
                summary: format!("sub-agent failed to start: {e}"),
                files_changed: Vec::new(),
                duration_ms: elapsed_ms(started),
            },
            Err(_) => {
                warn!(timeout_s = self.timeout.as_secs(), "sub-agent timed out");
                SubagentResult {
                    success: false,
                    summary: format!("timed out after {}s", self.timeout.as_secs()),
                    files_changed: files_changed(&engine),
                    duration_ms: elapsed_ms(started),
                }
            }
        };

        let _ = self.emitter.emit(EngineEvent::SubagentFinished {
            base: BaseEvent::now(&self.session_id),
            success: result.success,
            duration_ms: result.duration_ms,
        });
        result
    }

    /// Run many subtasks, batched. Results come back in request order.
    pub async fn spawn_parallel(&self, requests: &[SubtaskRequest]) -> Vec<SubagentResult> {
        let sizes = batch_sizes(requests.len(), self.concurrency_cap);
        info!(
            subtasks = requests.len(),
            batches = sizes.len(),
            "dispatching sub-agents"
        );

        let mut results = Vec::with_capacity(requests.len());
        let mut offset = 0;
        for size in sizes {
            let batch = &requests[offset..offset + size];
            let outcomes =
                futures::future::join_all(batch.iter().map(|request| self.spawn(request))).await;
            results.extend(outcomes);
            offset += size;
        }
        results
    }
}

/// Split `n` requests into at most `cap` batches, remainder in the first.
fn batch_sizes(n: usize, cap: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let batch_count = cap.max(1).min(n);
    let base = n / batch_count;
    let remainder = n % batch_count;
    let mut sizes = vec![base; batch_count];
    sizes[0] += remainder;
    sizes
}

/// Render the subtask as the sub-agent's opening prompt.
fn build_subagent_prompt(request: &SubtaskRequest) -> String {
    let mut prompt = request.instruction.clone();
    if !request.files.is_empty() {
        prompt.push_str("\n\nWork only on these files:");
        for file in &request.files {
            prompt.push_str("\n- ");
            prompt.push_str(file);
        }
    }
    if !request.tool_whitelist.is_empty() {
        prompt.push_str("\n\nYou may use only these tools: ");
        prompt.push_str(&request.tool_whitelist.join(", "));
        prompt.push('.');
    }
    prompt.push_str("\n\nDo not delegate further; complete this task yourself.");
    prompt
}

/// Capped summary of the sub-agent's final answer, taken from the tail of
/// its transcript.
fn summarize(engine: &ConversationEngine, error: &Option<String>) -> String {
    if let Some(error) = error {
        return format!("sub-agent turn failed: {error}");
    }
    let tail: Vec<&str> = engine
        .transcript()
        .iter()
        .rev()
        .filter(|m| m.role == tandem_core::messages::Role::Assistant && !m.content.is_empty())
        .take(2)
        .map(|m| m.content.as_str())
        .collect();
    let mut parts: Vec<&str> = tail.into_iter().rev().collect();
    if parts.is_empty() {
        parts.push("(no answer produced)");
    }
    truncate_output(&parts.join("\n"), SUMMARY_TOKEN_LIMIT * CHARS_PER_TOKEN)
}

/// Distinct files touched by write-class tool results, in first-touch order.
fn files_changed(engine: &ConversationEngine) -> Vec<String> {
    let mut files = Vec::new();
    for entry in engine.chat_log() {
        let Some(result) = &entry.tool_result else {
            continue;
        };
        if !result.success {
            continue;
        }
        if result.operation.is_some_and(|op| op.is_read_only()) {
            continue;
        }
        if let Some(path) = &result.file_path {
            if !files.contains(path) {
                files.push(path.clone());
            }
        }
    }
    files
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
