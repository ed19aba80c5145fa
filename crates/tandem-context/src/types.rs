//! Data types for the gather phase.

use serde::{Deserialize, Serialize};

use crate::budget::TokenBudget;

/// What kind of context a source carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A whole file read from disk.
    File,
    /// A line-range slice of a file.
    Snippet,
    /// A search-result excerpt.
    SearchResult,
}

/// One piece of gathered context. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSource {
    /// Normalized path of the underlying file.
    pub path: String,
    /// Source content.
    pub content: String,
    /// Kind of source.
    pub kind: SourceKind,
    /// Estimated token count of `content`.
    pub tokens: usize,
    /// Line range for `Snippet` sources, 1-based inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_range: Option<(usize, usize)>,
    /// Gather strategy that produced this source.
    pub strategy: String,
    /// Whether this source was served from the cache.
    pub from_cache: bool,
}

impl ContextSource {
    /// Create a whole-file source, estimating its token count.
    #[must_use]
    pub fn file(path: impl Into<String>, content: impl Into<String>, strategy: &str) -> Self {
        let content = content.into();
        let tokens = tandem_core::text::estimate_tokens(&content);
        Self {
            path: path.into(),
            content,
            kind: SourceKind::File,
            tokens,
            line_range: None,
            strategy: strategy.to_owned(),
            from_cache: false,
        }
    }
}

/// Input to [`crate::orchestrator::ContextOrchestrator::gather`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatherRequest {
    /// What the caller intends to do with the context (freeform label).
    pub intent: String,
    /// Free-text user query driving keyword extraction.
    pub query: String,
    /// Token budget for this pass.
    pub budget: TokenBudget,
    /// Files to read first, in order, before any search.
    #[serde(default)]
    pub priority_files: Vec<String>,
    /// Glob patterns to exclude from search results.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Maximum number of sources to gather.
    pub max_sources: usize,
}

impl GatherRequest {
    /// Minimal request: a query against a budget.
    #[must_use]
    pub fn new(query: impl Into<String>, budget: TokenBudget) -> Self {
        Self {
            intent: "gather".into(),
            query: query.into(),
            budget,
            priority_files: Vec::new(),
            exclude_patterns: Vec::new(),
            max_sources: 20,
        }
    }
}

/// Bookkeeping about one gather pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    /// Candidate paths seen before filtering.
    pub files_scanned: usize,
    /// Files actually read from disk.
    pub files_read: usize,
    /// Sum of source token counts.
    pub total_tokens: usize,
    /// Sources served from cache.
    pub cache_hits: usize,
    /// Sources read fresh.
    pub cache_misses: usize,
    /// Wall-clock duration of the pass.
    pub elapsed_ms: u64,
    /// Whether the final total overshot the budget (soft limit).
    pub budget_exceeded: bool,
}

/// The result of one gather pass: sources plus metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    /// Gathered sources, in gather order.
    pub sources: Vec<ContextSource>,
    /// Pass bookkeeping.
    pub metadata: BundleMetadata,
}

impl ContextBundle {
    /// Whether the bundle carries no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Render the bundle as a system-message block for transcript injection.
    #[must_use]
    pub fn to_system_text(&self) -> String {
        let mut out = String::from("Relevant codebase context:\n");
        for source in &self.sources {
            out.push_str(&format!("\n--- {} ---\n{}\n", source.path, source.content));
        }
        out
    }
}
