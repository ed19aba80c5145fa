//! # tandem-context
//!
//! Token-budgeted context gathering for the Tandem engine:
//!
//! - **[`budget::TokenBudget`]**: pure token accounting for one gather pass
//! - **[`cache::ContextCache`]**: LRU + TTL store of previously read sources
//!   with dependency-cascade invalidation
//! - **[`watcher::CacheWatcher`]**: filesystem watcher that invalidates cache
//!   entries when files change on disk
//! - **[`keywords`]**: query tokenization and stop-word filtering
//! - **[`search::SearchCollaborator`]**: external search interface plus
//!   fallback output parsing
//! - **[`orchestrator::ContextOrchestrator`]**: ties it all together into a
//!   [`types::ContextBundle`] per request
//!
//! ## Crate Position
//!
//! Depends on tandem-core. Consumed by tandem-runtime during the gather phase.

#![deny(unsafe_code)]

pub mod budget;
pub mod cache;
pub mod errors;
pub mod keywords;
pub mod orchestrator;
pub mod search;
pub mod types;
pub mod watcher;

pub use budget::TokenBudget;
pub use cache::{CacheStats, ContextCache, ContextCacheConfig, SharedContextCache};
pub use errors::ContextError;
pub use orchestrator::{ContextOrchestrator, OrchestratorConfig};
pub use search::SearchCollaborator;
pub use types::{BundleMetadata, ContextBundle, ContextSource, GatherRequest, SourceKind};
pub use watcher::CacheWatcher;
