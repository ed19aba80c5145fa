//! Filesystem watcher driving cache invalidation.
//!
//! Watches configured roots recursively and calls
//! [`ContextCache::invalidate_file`] when a file changes or disappears.
//! Build and vendor trees are ignored. Initialization failure degrades
//! gracefully: the cache keeps working, auto-invalidation is lost, and the
//! condition is surfaced through `watcher_active()` plus a warning log.
//!
//! [`ContextCache::invalidate_file`]: crate::cache::ContextCache::invalidate_file

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::cache::{SharedContextCache, normalize_path};
use crate::errors::ContextError;

/// Directory names never watched for invalidation.
const EXCLUDED_DIRS: &[&str] = &["target", "node_modules", ".git", "vendor", "dist", "build"];

/// Live watcher handle. Dropping it stops watching.
pub struct CacheWatcher {
    // Held only to keep the notify backend alive.
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl CacheWatcher {
    /// Watch `roots` recursively, invalidating `cache` on change/remove
    /// events.
    ///
    /// On success the cache's `watcher_active` flag is set. On failure the
    /// flag stays clear and the error is returned so the caller can decide
    /// how loudly to surface it; a warning is logged either way.
    pub fn start(cache: SharedContextCache, roots: &[PathBuf]) -> Result<Self, ContextError> {
        let exclusions = build_exclusions();
        let handler_cache = cache.clone();
        let handler_roots: Vec<PathBuf> = roots.to_vec();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => handle_event(&handler_cache, &handler_roots, &exclusions, &event),
                Err(err) => warn!(error = %err, "filesystem watch error"),
            }
        })
        .map_err(|e| init_failed(&cache, &e))?;

        for root in roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| init_failed(&cache, &e))?;
        }

        cache.lock().set_watcher_active(true);
        debug!(roots = roots.len(), "cache watcher started");
        Ok(Self {
            _watcher: watcher,
            roots: roots.to_vec(),
        })
    }

    /// Roots this watcher covers.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

fn init_failed(cache: &SharedContextCache, err: &notify::Error) -> ContextError {
    cache.lock().set_watcher_active(false);
    warn!(error = %err, "cache watcher failed to start; auto-invalidation disabled");
    ContextError::WatcherInit(err.to_string())
}

fn handle_event(
    cache: &SharedContextCache,
    roots: &[PathBuf],
    exclusions: &GlobSet,
    event: &Event,
) {
    if !matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Create(_)
    ) {
        return;
    }
    for path in &event.paths {
        if is_excluded(exclusions, path) {
            continue;
        }
        let mut guard = cache.lock();
        // Entries may be keyed absolute or root-relative; invalidate both.
        guard.invalidate_file(&path.to_string_lossy());
        for root in roots {
            if let Ok(relative) = path.strip_prefix(root) {
                guard.invalidate_file(&normalize_path(&relative.to_string_lossy()));
            }
        }
    }
}

fn build_exclusions() -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for dir in EXCLUDED_DIRS {
        for pattern in [format!("**/{dir}/**"), format!("**/{dir}")] {
            if let Ok(glob) = Glob::new(&pattern) {
                let _ = builder.add(glob);
            }
        }
    }
    // An empty set on build failure just means nothing is excluded.
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

fn is_excluded(exclusions: &GlobSet, path: &Path) -> bool {
    exclusions.is_match(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
