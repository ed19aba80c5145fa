//! Context orchestrator: assembles a bundle for a query within budget.
//!
//! Priority files are read first, greedily in list order. Remaining budget
//! goes to search-driven discovery: keywords from the query, one search
//! call, each distinct path read through the cache. The budget is a soft
//! limit; the last admitted source may overshoot, flagged in metadata.

use std::sync::Arc;
use std::time::Instant;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, instrument, warn};

use crate::cache::SharedContextCache;
use crate::keywords::extract_keywords;
use crate::search::{SearchCollaborator, parse_search_output};
use crate::types::{BundleMetadata, ContextBundle, ContextSource, GatherRequest};

/// Tuning knobs for the orchestrator.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Strategy label recorded on priority-file sources.
    pub priority_strategy: String,
    /// Strategy label recorded on search-discovered sources.
    pub search_strategy: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            priority_strategy: "priority".into(),
            search_strategy: "search".into(),
        }
    }
}

/// Gathers context sources for one request.
pub struct ContextOrchestrator {
    cache: SharedContextCache,
    search: Arc<dyn SearchCollaborator>,
    config: OrchestratorConfig,
}

impl ContextOrchestrator {
    /// Create an orchestrator over a shared cache and a search collaborator.
    #[must_use]
    pub fn new(cache: SharedContextCache, search: Arc<dyn SearchCollaborator>) -> Self {
        Self {
            cache,
            search,
            config: OrchestratorConfig::default(),
        }
    }

    /// Replace the default configuration.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble a context bundle for the request.
    ///
    /// Never fails: unreadable files are skipped, a failed search yields an
    /// empty discovery set, and no matches means an empty bundle.
    #[instrument(skip(self, request), fields(intent = %request.intent))]
    pub async fn gather(&self, request: &GatherRequest) -> ContextBundle {
        let start = Instant::now();
        let available = request.budget.available;
        let mut gathered = Gathered::default();

        // 1. Priority files, greedy in list order.
        for path in &request.priority_files {
            if gathered.total_tokens >= available || gathered.sources.len() >= request.max_sources {
                break;
            }
            self.read_into(path, &self.config.priority_strategy, &mut gathered)
                .await;
        }

        // 2. Search-driven discovery from query keywords.
        if gathered.total_tokens < available && gathered.sources.len() < request.max_sources {
            let keywords = extract_keywords(&request.query);
            if !keywords.is_empty() {
                let excludes = build_globset(&request.exclude_patterns);
                for path in self.discover(&keywords.join(" "), request.max_sources).await {
                    if gathered.total_tokens >= available
                        || gathered.sources.len() >= request.max_sources
                    {
                        break;
                    }
                    gathered.files_scanned += 1;
                    if excludes.is_match(&path) {
                        continue;
                    }
                    if gathered.sources.iter().any(|s| s.path == path) {
                        continue;
                    }
                    self.read_into(&path, &self.config.search_strategy, &mut gathered)
                        .await;
                }
            }
        }

        let total_tokens = gathered.total_tokens;
        ContextBundle {
            metadata: BundleMetadata {
                files_scanned: gathered.files_scanned,
                files_read: gathered.files_read,
                total_tokens,
                cache_hits: gathered.cache_hits,
                cache_misses: gathered.cache_misses,
                elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                budget_exceeded: total_tokens > available,
            },
            sources: gathered.sources,
        }
    }

    /// Run the search collaborator and parse its output into paths.
    /// Failure degrades to an empty discovery set.
    async fn discover(&self, query: &str, max_results: usize) -> Vec<String> {
        match self.search.search(query, max_results).await {
            Ok(output) => parse_search_output(&output),
            Err(err) => {
                warn!(error = %err, "search collaborator failed; continuing without discovery");
                Vec::new()
            }
        }
    }

    /// Read one path through the cache and append it to the bundle.
    /// Unreadable files are skipped with a debug log.
    async fn read_into(&self, path: &str, strategy: &str, gathered: &mut Gathered) {
        if let Some(source) = self.cache.lock().get(path, None) {
            gathered.cache_hits += 1;
            gathered.total_tokens += source.tokens;
            gathered.sources.push(source);
            return;
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let source = ContextSource::file(path, content, strategy);
                gathered.cache_misses += 1;
                gathered.files_read += 1;
                gathered.total_tokens += source.tokens;
                self.cache.lock().set(source.clone());
                gathered.sources.push(source);
            }
            Err(err) => {
                debug!(path, error = %err, "skipping unreadable source");
            }
        }
    }
}

#[derive(Default)]
struct Gathered {
    sources: Vec<ContextSource>,
    total_tokens: usize,
    files_scanned: usize,
    files_read: usize,
    cache_hits: usize,
    cache_misses: usize,
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                let _ = builder.add(glob);
            }
            Err(err) => warn!(pattern, error = %err, "ignoring invalid exclude pattern"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
