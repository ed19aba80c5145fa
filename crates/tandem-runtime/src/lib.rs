//! # tandem-runtime
//!
//! The conversation engine: gather → act → verify.
//!
//! - **[`engine::ConversationEngine`]**: the bounded multi-round turn loop
//! - **[`executor::ToolGate`]**: hook, mode, and cancellation gating around
//!   the external tool executor
//! - **[`verifier::VerificationGate`]**: post-action lint/test/type checks
//! - **[`subagent::SubagentDispatcher`]**: isolated, batched, timeout-raced
//!   sub-engines
//! - **[`hooks::HookCollaborator`]**: before/after tool interception
//!
//! ## Crate Position
//!
//! Root crate of the workspace. Composes tandem-core, tandem-context, and
//! tandem-llm.

#![deny(unsafe_code)]

pub mod engine;
pub mod errors;
pub mod executor;
pub mod hooks;
pub mod subagent;
pub mod types;
pub mod verifier;

pub use engine::ConversationEngine;
pub use errors::{RuntimeError, StopReason};
pub use executor::{ToolExecutor, ToolGate};
pub use hooks::{HookCollaborator, HookDecision};
pub use subagent::{EngineFactory, SubagentDispatcher};
pub use types::{
    CheckResult, EngineConfig, SubagentResult, SubtaskRequest, TurnResult, VerificationConfig,
    VerificationMode, VerificationResult,
};
pub use verifier::VerificationGate;
