//! The conversation engine: gather, act, verify.
//!
//! One engine owns one session. A turn starts from user input, gathers
//! context within budget, then loops: stream a model response, execute any
//! requested tool calls through the gate, verify write effects, and feed
//! results back until the model answers in plain text or the round limit
//! trips. Turn-level failures are contained in [`TurnResult`]; the
//! transcript survives them intact.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use tandem_context::budget::TokenBudget;
use tandem_context::cache::{ContextCache, SharedContextCache};
use tandem_context::orchestrator::ContextOrchestrator;
use tandem_context::search::SearchCollaborator;
use tandem_context::types::GatherRequest;
use tandem_core::events::{BaseEvent, EngineEvent, EventEmitter};
use tandem_core::messages::{ChatEntry, ChatEntryKind, ConversationMessage, ToolCall};
use tandem_core::mode::ModeHandle;
use tandem_core::text::{estimate_tokens, truncate_output};
use tandem_llm::assembler::assemble;
use tandem_llm::backend::{ModelBackend, ToolSpec};

use crate::errors::{RuntimeError, StopReason};
use crate::executor::{ToolExecutor, ToolGate};
use crate::hooks::HookCollaborator;
use crate::subagent::{EngineFactory, SubagentDispatcher};
use crate::types::{EngineConfig, TurnResult};
use crate::verifier::VerificationGate;

// ─────────────────────────────────────────────────────────────────────────────
// RunGuard
// ─────────────────────────────────────────────────────────────────────────────

/// Single-flight guard: a turn holds it for its whole duration and the flag
/// resets on drop, including on early return.
#[derive(Debug)]
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, RuntimeError> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RuntimeError::Busy);
        }
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConversationEngine
// ─────────────────────────────────────────────────────────────────────────────

/// One session's engine. Owns both transcripts and all collaborators.
pub struct ConversationEngine {
    session_id: String,
    config: EngineConfig,
    backend: Arc<dyn ModelBackend>,
    executor: Arc<dyn ToolExecutor>,
    gate: ToolGate,
    orchestrator: ContextOrchestrator,
    verifier: VerificationGate,
    cache: SharedContextCache,
    mode: ModeHandle,
    emitter: Arc<EventEmitter>,
    tools: Vec<ToolSpec>,
    transcript: Vec<ConversationMessage>,
    chat_log: Vec<ChatEntry>,
    is_running: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
}

impl ConversationEngine {
    /// Create an engine over external collaborators.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        config: EngineConfig,
        backend: Arc<dyn ModelBackend>,
        executor: Arc<dyn ToolExecutor>,
        search: Arc<dyn SearchCollaborator>,
        tools: Vec<ToolSpec>,
    ) -> Self {
        let mode = ModeHandle::default();
        let cache = ContextCache::shared();
        let verifier = VerificationGate::new(config.verification.clone());
        Self {
            session_id: session_id.into(),
            gate: ToolGate::new(executor.clone(), None, mode.clone()),
            orchestrator: ContextOrchestrator::new(cache.clone(), search),
            verifier,
            cache,
            mode,
            emitter: Arc::new(EventEmitter::new()),
            tools,
            transcript: Vec::new(),
            chat_log: Vec::new(),
            is_running: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
            config,
            backend,
            executor,
        }
    }

    /// Attach a hook collaborator to the tool gate.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn HookCollaborator>) -> Self {
        self.gate = ToolGate::new(self.executor.clone(), Some(hooks), self.mode.clone());
        self
    }

    /// Share an existing context cache instead of a fresh one (subagents
    /// reuse the parent's cache).
    #[must_use]
    pub fn with_cache(
        mut self,
        cache: SharedContextCache,
        search: Arc<dyn SearchCollaborator>,
    ) -> Self {
        self.orchestrator = ContextOrchestrator::new(cache.clone(), search);
        self.cache = cache;
        self
    }

    /// Build a sub-agent dispatcher owned by this engine. The dispatcher
    /// inherits the engine's emitter and session id, and whether it may
    /// spawn at all comes from the engine's configuration, so an engine
    /// built for a subtask can never delegate further.
    #[must_use]
    pub fn subagent_dispatcher(&self, factory: Arc<dyn EngineFactory>) -> SubagentDispatcher {
        SubagentDispatcher::new(
            factory,
            self.emitter.clone(),
            self.session_id.clone(),
            self.config.can_spawn_subagents,
        )
    }

    /// Handle to the operation-mode state.
    #[must_use]
    pub fn mode(&self) -> ModeHandle {
        self.mode.clone()
    }

    /// Event emitter for UI subscription.
    #[must_use]
    pub fn emitter(&self) -> Arc<EventEmitter> {
        self.emitter.clone()
    }

    /// Shared context cache (for wiring a file watcher).
    #[must_use]
    pub fn cache(&self) -> SharedContextCache {
        self.cache.clone()
    }

    /// Model-facing transcript.
    #[must_use]
    pub fn transcript(&self) -> &[ConversationMessage] {
        &self.transcript
    }

    /// UI-facing transcript.
    #[must_use]
    pub fn chat_log(&self) -> &[ChatEntry] {
        &self.chat_log
    }

    /// Cancel the in-flight turn, if any. Idempotent.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    /// Run one user turn to completion.
    ///
    /// Returns `Err` only for the busy precondition. Backend failures,
    /// cancellation, and the round limit are reported inside [`TurnResult`]
    /// with the transcript left intact.
    #[instrument(skip(self, user_input), fields(session = %self.session_id))]
    pub async fn run_turn(&mut self, user_input: &str) -> Result<TurnResult, RuntimeError> {
        let _guard = RunGuard::acquire(&self.is_running)?;
        let cancel = {
            let mut slot = self.cancel.lock();
            *slot = CancellationToken::new();
            slot.clone()
        };
        let started = Instant::now();

        self.transcript.push(ConversationMessage::user(user_input));
        self.chat_log
            .push(ChatEntry::new(ChatEntryKind::User, user_input));
        let _ = self.emitter.emit(EngineEvent::TurnStart {
            base: self.base_event(),
        });

        self.gather_context(user_input).await;

        let mut rounds: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Ok(self.finish_cancelled(rounds, started));
            }

            let stream = match self.backend.stream_complete(&self.transcript, &self.tools).await {
                Ok(stream) => stream,
                Err(e) => return Ok(self.finish_failed(e.into(), rounds, started)),
            };
            let message =
                match assemble(stream, &self.session_id, &self.emitter, &cancel).await {
                    Ok(message) => message,
                    Err(e) => return Ok(self.finish_failed(e.into(), rounds, started)),
                };
            if message.cancelled {
                return Ok(self.finish_cancelled(rounds, started));
            }

            if !message.has_tool_calls() {
                self.transcript
                    .push(ConversationMessage::assistant(message.content.clone()));
                self.chat_log
                    .push(ChatEntry::new(ChatEntryKind::Assistant, message.content));
                return Ok(self.finish_ok(StopReason::EndTurn, rounds, started));
            }

            rounds += 1;
            if rounds > self.config.max_tool_rounds {
                let executed = rounds - 1;
                warn!(
                    limit = self.config.max_tool_rounds,
                    "tool round limit reached, stopping turn"
                );
                self.chat_log.push(ChatEntry::new(
                    ChatEntryKind::Notice,
                    format!(
                        "Stopped after {executed} tool rounds (limit {})",
                        self.config.max_tool_rounds
                    ),
                ));
                if !message.content.is_empty() {
                    self.transcript
                        .push(ConversationMessage::assistant(message.content));
                }
                return Ok(self.finish_ok(StopReason::RoundLimit, executed, started));
            }

            let calls = message.tool_calls.clone();
            let _ = self.emitter.emit(EngineEvent::RoundStart {
                base: self.base_event(),
                round: rounds,
                tool_call_count: u32::try_from(calls.len()).unwrap_or(u32::MAX),
            });
            self.transcript.push(ConversationMessage::assistant_with_calls(
                message.content.clone(),
                calls.clone(),
            ));
            if !message.content.is_empty() {
                self.chat_log
                    .push(ChatEntry::new(ChatEntryKind::Assistant, message.content));
            }

            for call in calls {
                self.execute_call(call, &cancel).await;
            }
        }
    }

    /// Execute one call through the gate, record it in both transcripts,
    /// and run verification on its effect.
    async fn execute_call(&mut self, call: ToolCall, cancel: &CancellationToken) {
        let entry_index = self.chat_log.len();
        self.chat_log.push(ChatEntry::pending_tool_call(call.clone()));
        let _ = self.emitter.emit(EngineEvent::ToolExecutionStart {
            base: self.base_event(),
            tool_call: call.clone(),
        });

        let started = Instant::now();
        let mut result = self.gate.run(&call, cancel).await;
        result.output = truncate_output(&result.output, self.config.max_tool_output_chars);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.chat_log[entry_index].upgrade_to_result(result.clone());
        self.transcript
            .push(ConversationMessage::tool(call.id.clone(), result.output.clone()));
        let _ = self.emitter.emit(EngineEvent::ToolExecutionEnd {
            base: self.base_event(),
            tool_call_id: call.id.clone(),
            result: result.clone(),
            duration_ms,
        });

        let verification = self.verifier.verify(&result).await;
        if verification.checks.is_empty() {
            return;
        }
        let feedback = verification.feedback();
        let _ = self.emitter.emit(EngineEvent::VerificationCompleted {
            base: self.base_event(),
            passed: verification.passed,
            feedback: feedback.clone(),
        });
        if let Some(feedback) = feedback {
            // Corrective feedback goes back to the model as a user message.
            self.transcript.push(ConversationMessage::user(format!(
                "Verification failed after {}:\n{feedback}",
                call.name
            )));
        }
    }

    /// Gather context for the turn and inject it as a system message.
    async fn gather_context(&mut self, user_input: &str) {
        let history_tokens: usize = self
            .transcript
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();
        let budget = TokenBudget::new(
            self.config.context_window,
            self.config.context_reserved_fraction,
            history_tokens,
        );
        if budget.is_exhausted() {
            debug!("context budget exhausted by history, skipping gather");
            return;
        }

        let mut request = GatherRequest::new(user_input, budget);
        request.max_sources = self.config.max_context_sources;
        let bundle = self.orchestrator.gather(&request).await;
        info!(
            sources = bundle.sources.len(),
            tokens = bundle.metadata.total_tokens,
            cache_hits = bundle.metadata.cache_hits,
            "context gathered"
        );
        if !bundle.is_empty() {
            self.transcript
                .push(ConversationMessage::system(bundle.to_system_text()));
        }
    }

    fn finish_ok(&self, stop_reason: StopReason, rounds: u32, started: Instant) -> TurnResult {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let _ = self.emitter.emit(EngineEvent::TurnEnd {
            base: self.base_event(),
            rounds,
            duration_ms,
        });
        TurnResult {
            rounds,
            stop_reason,
            duration_ms,
            error: None,
        }
    }

    fn finish_cancelled(&mut self, rounds: u32, started: Instant) -> TurnResult {
        self.chat_log
            .push(ChatEntry::new(ChatEntryKind::Notice, "Turn cancelled"));
        let _ = self.emitter.emit(EngineEvent::TurnCancelled {
            base: self.base_event(),
        });
        TurnResult {
            rounds,
            stop_reason: StopReason::Cancelled,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            error: None,
        }
    }

    fn finish_failed(&mut self, error: RuntimeError, rounds: u32, started: Instant) -> TurnResult {
        warn!(error = %error, category = error.category(), "turn failed");
        self.chat_log
            .push(ChatEntry::new(ChatEntryKind::Error, error.to_string()));
        let _ = self.emitter.emit(EngineEvent::TurnFailed {
            base: self.base_event(),
            error: error.to_string(),
            category: error.category().to_owned(),
            recoverable: error.is_recoverable(),
        });
        TurnResult {
            rounds,
            stop_reason: StopReason::Error,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            error: Some(error.to_string()),
        }
    }

    fn base_event(&self) -> BaseEvent {
        BaseEvent::now(&self.session_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use tandem_context::errors::ContextError;
    use tandem_core::messages::{Role, ToolOperation, ToolResult};
    use tandem_llm::backend::{BackendError, DeltaStream, StreamDelta, ToolCallDelta};
    use crate::types::{VerificationConfig, VerificationMode};

    // ── fixtures ────────────────────────────────────────────────────────────

    struct MockBackend {
        responses: Mutex<Vec<Vec<Result<StreamDelta, BackendError>>>>,
    }

    impl MockBackend {
        fn new(responses: Vec<Vec<Result<StreamDelta, BackendError>>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for MockBackend {
        async fn complete(
            &self,
            _messages: &[ConversationMessage],
            _tools: &[ToolSpec],
        ) -> Result<ConversationMessage, BackendError> {
            Err(BackendError::Network("mock complete unused".into()))
        }

        async fn stream_complete(
            &self,
            _messages: &[ConversationMessage],
            _tools: &[ToolSpec],
        ) -> Result<DeltaStream, BackendError> {
            let mut queue = self.responses.lock();
            if queue.is_empty() {
                return Err(BackendError::Network("queue exhausted".into()));
            }
            let deltas = queue.remove(0);
            Ok(futures::stream::iter(deltas).boxed())
        }
    }

    fn text_response(text: &str) -> Vec<Result<StreamDelta, BackendError>> {
        vec![Ok(StreamDelta::text(text))]
    }

    fn tool_response(id: &str, name: &str) -> Vec<Result<StreamDelta, BackendError>> {
        vec![Ok(StreamDelta {
            content: None,
            tool_calls: Some(vec![ToolCallDelta {
                index: Some(0),
                id: Some(id.into()),
                name: Some(name.into()),
                arguments: Some("{}".into()),
            }]),
        })]
    }

    struct FakeExecutor {
        executed: Arc<Mutex<Vec<String>>>,
        output: String,
        file_path: Option<String>,
    }

    impl FakeExecutor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                executed: Arc::new(Mutex::new(Vec::new())),
                output: "tool output".into(),
                file_path: None,
            })
        }

        fn with_output(output: impl Into<String>, file_path: Option<String>) -> Arc<Self> {
            Arc::new(Self {
                executed: Arc::new(Mutex::new(Vec::new())),
                output: output.into(),
                file_path,
            })
        }
    }

    #[async_trait]
    impl ToolExecutor for FakeExecutor {
        async fn execute(&self, call: &ToolCall) -> ToolResult {
            self.executed.lock().push(call.name.clone());
            let mut result = ToolResult::ok(self.output.clone())
                .with_operation(self.operation_of(&call.name));
            if let Some(path) = &self.file_path {
                result = result.with_file(path.clone());
            }
            result
        }

        fn operation_of(&self, tool_name: &str) -> ToolOperation {
            match tool_name {
                "read_file" => ToolOperation::View,
                _ => ToolOperation::Edit,
            }
        }
    }

    struct NoSearch;

    #[async_trait]
    impl SearchCollaborator for NoSearch {
        async fn search(&self, _query: &str, _max_results: usize) -> Result<String, ContextError> {
            Ok(String::new())
        }
    }

    struct FixedSearch(String);

    #[async_trait]
    impl SearchCollaborator for FixedSearch {
        async fn search(&self, _query: &str, _max_results: usize) -> Result<String, ContextError> {
            Ok(self.0.clone())
        }
    }

    fn engine_with(
        backend: Arc<MockBackend>,
        executor: Arc<FakeExecutor>,
        config: EngineConfig,
    ) -> ConversationEngine {
        ConversationEngine::new("s1", config, backend, executor, Arc::new(NoSearch), vec![])
    }

    // ── turns ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn plain_answer_ends_the_turn() {
        let backend = MockBackend::new(vec![text_response("All done.")]);
        let mut engine = engine_with(backend, FakeExecutor::new(), EngineConfig::default());

        let result = engine.run_turn("hello").await.unwrap();
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.rounds, 0);

        let transcript = engine.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[1].content, "All done.");
    }

    #[tokio::test]
    async fn tool_round_then_answer() {
        let backend = MockBackend::new(vec![
            tool_response("tc-1", "edit_file"),
            text_response("Edited."),
        ]);
        let executor = FakeExecutor::new();
        let mut engine = engine_with(backend, executor.clone(), EngineConfig::default());

        let result = engine.run_turn("fix the bug").await.unwrap();
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.rounds, 1);
        assert_eq!(executor.executed.lock().as_slice(), ["edit_file"]);

        // user, assistant+calls, tool, assistant
        let roles: Vec<Role> = engine.transcript().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(
            engine.transcript()[2].tool_call_id.as_deref(),
            Some("tc-1")
        );
    }

    #[tokio::test]
    async fn chat_entry_upgrades_in_place() {
        let backend = MockBackend::new(vec![
            tool_response("tc-1", "edit_file"),
            text_response("done"),
        ]);
        let mut engine = engine_with(backend, FakeExecutor::new(), EngineConfig::default());

        let _ = engine.run_turn("go").await.unwrap();
        let tool_entries: Vec<&ChatEntry> = engine
            .chat_log()
            .iter()
            .filter(|e| e.tool_call.is_some())
            .collect();
        assert_eq!(tool_entries.len(), 1);
        assert_eq!(tool_entries[0].kind, ChatEntryKind::ToolResult);
        assert_eq!(tool_entries[0].content, "tool output");
    }

    #[tokio::test]
    async fn round_limit_stops_the_loop() {
        let backend = MockBackend::new(vec![
            tool_response("tc-1", "edit_file"),
            tool_response("tc-2", "edit_file"),
            tool_response("tc-3", "edit_file"),
        ]);
        let executor = FakeExecutor::new();
        let config = EngineConfig {
            max_tool_rounds: 2,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(backend, executor.clone(), config);

        let result = engine.run_turn("loop forever").await.unwrap();
        assert_eq!(result.stop_reason, StopReason::RoundLimit);
        assert_eq!(result.rounds, 2);
        // Exactly two rounds executed; the third response's call never ran.
        assert_eq!(executor.executed.lock().len(), 2);
        assert!(engine
            .chat_log()
            .iter()
            .any(|e| e.kind == ChatEntryKind::Notice && e.content.contains("limit 2")));
    }

    #[tokio::test]
    async fn backend_error_is_contained() {
        let backend = MockBackend::new(vec![]);
        let mut engine = engine_with(backend, FakeExecutor::new(), EngineConfig::default());

        let result = engine.run_turn("hello").await.unwrap();
        assert_eq!(result.stop_reason, StopReason::Error);
        assert!(result.error.unwrap().contains("queue exhausted"));
        // User message survives for the next turn.
        assert_eq!(engine.transcript().len(), 1);
        assert!(engine
            .chat_log()
            .iter()
            .any(|e| e.kind == ChatEntryKind::Error));
    }

    #[tokio::test]
    async fn cancelled_stream_cancels_the_turn() {
        let backend = MockBackend::new(vec![vec![
            Ok(StreamDelta::text("partial")),
            Err(BackendError::Cancelled),
        ]]);
        let mut engine = engine_with(backend, FakeExecutor::new(), EngineConfig::default());

        let result = engine.run_turn("hello").await.unwrap();
        assert_eq!(result.stop_reason, StopReason::Cancelled);
        // Partial accumulation is discarded, not committed.
        assert!(engine
            .transcript()
            .iter()
            .all(|m| m.role != Role::Assistant));
        assert!(engine
            .chat_log()
            .iter()
            .any(|e| e.kind == ChatEntryKind::Notice && e.content.contains("cancelled")));
    }

    #[tokio::test]
    async fn tool_output_is_truncated_for_the_transcript() {
        let backend = MockBackend::new(vec![
            tool_response("tc-1", "edit_file"),
            text_response("ok"),
        ]);
        let executor = FakeExecutor::with_output("x".repeat(500), None);
        let config = EngineConfig {
            max_tool_output_chars: 100,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(backend, executor, config);

        let _ = engine.run_turn("go").await.unwrap();
        let tool_msg = engine
            .transcript()
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.contains("[Truncated: 500 chars total"));
    }

    #[tokio::test]
    async fn failing_verification_feeds_back_to_the_model() {
        let backend = MockBackend::new(vec![
            tool_response("tc-1", "edit_file"),
            text_response("fixed"),
        ]);
        let executor = FakeExecutor::with_output("edited", Some("src/lib.rs".into()));
        let config = EngineConfig {
            verification: VerificationConfig {
                mode: VerificationMode::Fast,
                lint_command: Some(vec!["false".into()]),
                ..VerificationConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut engine = engine_with(backend, executor, config);
        let mut events = engine.emitter().subscribe();

        let _ = engine.run_turn("go").await.unwrap();
        let feedback = engine
            .transcript()
            .iter()
            .find(|m| m.role == Role::User && m.content.contains("Verification failed"))
            .unwrap();
        assert!(feedback.content.contains("edit_file"));
        assert!(feedback.content.contains("lint check failed:"));

        let mut saw_verification = false;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::VerificationCompleted { passed, .. } = event {
                assert!(!passed);
                saw_verification = true;
            }
        }
        assert!(saw_verification);
    }

    #[tokio::test]
    async fn read_only_tools_skip_verification() {
        let backend = MockBackend::new(vec![
            tool_response("tc-1", "read_file"),
            text_response("ok"),
        ]);
        let executor = FakeExecutor::with_output("contents", Some("src/lib.rs".into()));
        let config = EngineConfig {
            verification: VerificationConfig {
                mode: VerificationMode::Fast,
                lint_command: Some(vec!["false".into()]),
                ..VerificationConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut engine = engine_with(backend, executor, config);

        let _ = engine.run_turn("look").await.unwrap();
        assert!(!engine
            .transcript()
            .iter()
            .any(|m| m.content.contains("Verification failed")));
    }

    #[tokio::test]
    async fn gathered_context_is_injected_as_system_message() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("widget.rs");
        std::fs::write(&file, "pub struct Widget;").unwrap();

        let backend = MockBackend::new(vec![text_response("It is a struct.")]);
        let mut engine = ConversationEngine::new(
            "s1",
            EngineConfig::default(),
            backend,
            FakeExecutor::new(),
            Arc::new(FixedSearch(file.to_string_lossy().into_owned())),
            vec![],
        );

        let _ = engine.run_turn("explain the widget module").await.unwrap();
        let system = engine
            .transcript()
            .iter()
            .find(|m| m.role == Role::System)
            .unwrap();
        assert!(system.content.contains("Relevant codebase context:"));
        assert!(system.content.contains("pub struct Widget;"));
    }

    #[tokio::test]
    async fn turn_events_bracket_the_run() {
        let backend = MockBackend::new(vec![text_response("hi")]);
        let mut engine = engine_with(backend, FakeExecutor::new(), EngineConfig::default());
        let mut events = engine.emitter().subscribe();

        let _ = engine.run_turn("hello").await.unwrap();
        assert_matches::assert_matches!(
            events.try_recv().unwrap(),
            EngineEvent::TurnStart { .. }
        );
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert_matches::assert_matches!(last, Some(EngineEvent::TurnEnd { rounds: 0, .. }));
    }

    #[tokio::test]
    async fn run_guard_rejects_reentry_and_resets() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = RunGuard::acquire(&flag).unwrap();
        assert_matches::assert_matches!(
            RunGuard::acquire(&flag),
            Err(RuntimeError::Busy)
        );
        drop(guard);
        assert!(RunGuard::acquire(&flag).is_ok());
    }

    #[tokio::test]
    async fn consecutive_turns_share_the_transcript() {
        let backend = MockBackend::new(vec![text_response("one"), text_response("two")]);
        let mut engine = engine_with(backend, FakeExecutor::new(), EngineConfig::default());

        let _ = engine.run_turn("first").await.unwrap();
        let _ = engine.run_turn("second").await.unwrap();
        let roles: Vec<Role> = engine.transcript().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }
}
