//! # tandem-core
//!
//! Foundation types shared by all Tandem crates:
//!
//! - **Messages**: [`messages::ConversationMessage`] (model-facing transcript)
//!   and [`messages::ChatEntry`] (UI-facing transcript superset)
//! - **Tool types**: [`messages::ToolCall`], [`messages::ToolResult`],
//!   [`messages::ToolOperation`]
//! - **Events**: [`events::EngineEvent`] lifecycle events and the broadcast
//!   [`events::EventEmitter`]
//! - **Mode**: [`mode::OperationMode`] write-permission state behind a shared
//!   [`mode::ModeHandle`]
//! - **Errors**: [`errors::CoreError`]
//! - **Text**: token estimation and truncation helpers
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by tandem-context, tandem-llm, and
//! tandem-runtime.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod logging;
pub mod messages;
pub mod mode;
pub mod text;
