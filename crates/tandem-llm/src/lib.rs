//! # tandem-llm
//!
//! Model backend interface and streaming response assembly:
//!
//! - **[`backend::ModelBackend`]**: the external language-model contract
//!   (one-shot `complete` plus `stream_complete` yielding partial deltas)
//! - **[`merge::merge_delta`]**: the recursive merge rule turning partial
//!   deltas into one accumulated value
//! - **[`assembler`]**: consumes a delta stream into a final message,
//!   handling tool-call commitment, mis-emitted JSON fallback parsing, and
//!   per-chunk cancellation
//!
//! ## Crate Position
//!
//! Depends on tandem-core. Consumed by tandem-runtime during the act phase.

#![deny(unsafe_code)]

pub mod assembler;
pub mod backend;
pub mod merge;

pub use assembler::{AssembledMessage, assemble};
pub use backend::{BackendError, DeltaStream, ModelBackend, StreamDelta, ToolCallDelta, ToolSpec};
pub use merge::merge_delta;
