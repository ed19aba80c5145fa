//! LRU + TTL cache of gathered context sources.
//!
//! Entries are keyed by normalized path, optionally suffixed with a
//! line-range tag so whole-file and partial-file reads of the same file do
//! not collide. Invalidation removes every key sharing the path prefix, then
//! cascades through registered dependency edges.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::types::ContextSource;

const DEFAULT_TTL_SECS: u64 = 5 * 60;
const DEFAULT_MAX_ENTRIES: usize = 100;

/// Shared handle to the cache, safe to touch from the watcher callback
/// concurrently with orchestrator reads.
pub type SharedContextCache = Arc<Mutex<ContextCache>>;

/// Configuration for the context cache.
pub struct ContextCacheConfig {
    /// TTL for cache entries.
    pub ttl: Duration,
    /// Maximum number of cached entries.
    pub max_entries: usize,
}

impl Default for ContextCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

struct CacheEntry {
    source: ContextSource,
    expires_at: Instant,
    hit_count: u64,
}

/// Bounded, time-expiring store of previously read context sources.
pub struct ContextCache {
    entries: HashMap<String, CacheEntry>,
    access_order: Vec<String>,
    /// imported path -> set of importer paths
    importers: HashMap<String, HashSet<String>>,
    config: ContextCacheConfig,
    hits: u64,
    misses: u64,
    tokens_saved: u64,
    watcher_active: bool,
}

impl ContextCache {
    /// Create a cache with the given configuration.
    #[must_use]
    pub fn new(config: ContextCacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            access_order: Vec::new(),
            importers: HashMap::new(),
            config,
            hits: 0,
            misses: 0,
            tokens_saved: 0,
            watcher_active: false,
        }
    }

    /// Create a shared handle with default configuration.
    #[must_use]
    pub fn shared() -> SharedContextCache {
        Arc::new(Mutex::new(Self::new(ContextCacheConfig::default())))
    }

    /// Look up a source, updating LRU order. Returns a clone with
    /// `from_cache` set. `None` on miss or expiry.
    pub fn get(&mut self, path: &str, line_range: Option<(usize, usize)>) -> Option<ContextSource> {
        let key = cache_key(path, line_range);

        // Check expiry first
        if let Some(entry) = self.entries.get(&key) {
            if Instant::now() >= entry.expires_at {
                drop(self.entries.remove(&key));
                self.access_order.retain(|k| k != &key);
                self.misses += 1;
                return None;
            }
        } else {
            self.misses += 1;
            return None;
        }

        // Update LRU order
        self.access_order.retain(|k| k != &key);
        self.access_order.push(key.clone());
        self.hits += 1;

        let entry = self.entries.get_mut(&key)?;
        entry.hit_count += 1;
        self.tokens_saved += u64::try_from(entry.source.tokens).unwrap_or(u64::MAX);

        let mut source = entry.source.clone();
        source.from_cache = true;
        Some(source)
    }

    /// Store a source, evicting past capacity. Overwriting an existing key
    /// never evicts anything else.
    pub fn set(&mut self, source: ContextSource) {
        let key = cache_key(&source.path, source.line_range);

        self.access_order.retain(|k| k != &key);

        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.config.max_entries {
                self.evict_oldest();
            }
        }

        let entry = CacheEntry {
            source,
            expires_at: Instant::now() + self.config.ttl,
            hit_count: 0,
        };
        drop(self.entries.insert(key.clone(), entry));
        self.access_order.push(key);
    }

    /// Whether a live entry exists for this path and range.
    #[must_use]
    pub fn has(&self, path: &str, line_range: Option<(usize, usize)>) -> bool {
        let key = cache_key(path, line_range);
        self.entries
            .get(&key)
            .is_some_and(|e| Instant::now() < e.expires_at)
    }

    /// Record that `importer` depends on `imported`, so invalidating the
    /// imported file also invalidates the importer.
    pub fn register_dependency(&mut self, importer: &str, imported: &str) {
        let _ = self
            .importers
            .entry(normalize_path(imported))
            .or_default()
            .insert(normalize_path(importer));
    }

    /// Drop every entry for `path` (all line-range variants), then cascade
    /// to every registered importer, recursively.
    pub fn invalidate_file(&mut self, path: &str) {
        let mut visited = HashSet::new();
        self.invalidate_recursive(&normalize_path(path), &mut visited);
    }

    fn invalidate_recursive(&mut self, path: &str, visited: &mut HashSet<String>) {
        if !visited.insert(path.to_owned()) {
            return;
        }

        let prefix = format!("{path}#");
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|k| *k == path || k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in &doomed {
            drop(self.entries.remove(key));
            self.access_order.retain(|k| k != key);
        }

        let dependents: Vec<String> = self
            .importers
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        for dependent in dependents {
            self.invalidate_recursive(&dependent, visited);
        }
    }

    /// Remove all entries, dependency edges, and stats.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_order.clear();
        self.importers.clear();
        self.hits = 0;
        self.misses = 0;
        self.tokens_saved = 0;
    }

    /// Mark whether the filesystem watcher is driving invalidation.
    pub fn set_watcher_active(&mut self, active: bool) {
        self.watcher_active = active;
    }

    /// Whether auto-invalidation is currently live.
    #[must_use]
    pub fn watcher_active(&self) -> bool {
        self.watcher_active
    }

    /// Snapshot of cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            tokens_saved: self.tokens_saved,
            #[allow(clippy::cast_precision_loss)]
            hit_rate: if total == 0 {
                0.0
            } else {
                self.hits as f64 / total as f64
            },
            watcher_active: self.watcher_active,
        }
    }

    fn evict_oldest(&mut self) {
        // Prefer expired entries over LRU
        let now = Instant::now();
        let expired_key = self
            .entries
            .iter()
            .find(|(_, e)| now >= e.expires_at)
            .map(|(k, _)| k.clone());

        if let Some(key) = expired_key {
            drop(self.entries.remove(&key));
            self.access_order.retain(|k| k != &key);
            return;
        }

        if let Some(oldest) = self.access_order.first().cloned() {
            drop(self.entries.remove(&oldest));
            drop(self.access_order.remove(0));
        }
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new(ContextCacheConfig::default())
    }
}

/// Cache statistics snapshot.
#[derive(Clone, Copy, Debug)]
pub struct CacheStats {
    /// Number of live entries.
    pub entries: usize,
    /// Lookup hits.
    pub hits: u64,
    /// Lookup misses.
    pub misses: u64,
    /// Cumulative tokens served from cache instead of re-read.
    pub tokens_saved: u64,
    /// Hit rate (0.0 to 1.0).
    pub hit_rate: f64,
    /// Whether the filesystem watcher is live.
    pub watcher_active: bool,
}

/// Normalize a path for keying: forward slashes, no `./` prefix.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_owned()
}

fn cache_key(path: &str, line_range: Option<(usize, usize)>) -> String {
    let normalized = normalize_path(path);
    match line_range {
        Some((start, end)) => format!("{normalized}#L{start}-{end}"),
        None => normalized,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextSource;

    fn make_source(path: &str) -> ContextSource {
        ContextSource::file(path, "fn main() {}", "test")
    }

    fn make_snippet(path: &str, range: (usize, usize)) -> ContextSource {
        let mut s = make_source(path);
        s.line_range = Some(range);
        s
    }

    #[test]
    fn set_then_get_marks_from_cache() {
        let mut cache = ContextCache::default();
        cache.set(make_source("src/lib.rs"));
        let hit = cache.get("src/lib.rs", None).unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.path, "src/lib.rs");
    }

    #[test]
    fn line_range_variants_do_not_collide() {
        let mut cache = ContextCache::default();
        cache.set(make_source("src/lib.rs"));
        cache.set(make_snippet("src/lib.rs", (1, 50)));

        assert!(cache.get("src/lib.rs", None).is_some());
        assert!(cache.get("src/lib.rs", Some((1, 50))).is_some());
        // Different range on the same path is always a miss
        assert!(cache.get("src/lib.rs", Some((51, 100))).is_none());
    }

    #[test]
    fn normalized_paths_share_a_key() {
        let mut cache = ContextCache::default();
        cache.set(make_source("./src/lib.rs"));
        assert!(cache.get("src/lib.rs", None).is_some());
    }

    #[test]
    fn ttl_expiry() {
        let mut cache = ContextCache::new(ContextCacheConfig {
            ttl: Duration::from_millis(0),
            max_entries: 100,
        });
        cache.set(make_source("a.rs"));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("a.rs", None).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn lru_eviction_past_capacity() {
        let mut cache = ContextCache::new(ContextCacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 2,
        });
        cache.set(make_source("a.rs"));
        cache.set(make_source("b.rs"));
        cache.set(make_source("c.rs"));

        assert!(cache.get("a.rs", None).is_none());
        assert!(cache.get("b.rs", None).is_some());
        assert!(cache.get("c.rs", None).is_some());
    }

    #[test]
    fn overwrite_at_capacity_keeps_other_entries() {
        let mut cache = ContextCache::new(ContextCacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 2,
        });
        cache.set(make_source("a.rs"));
        cache.set(make_source("b.rs"));
        cache.set(make_source("a.rs")); // overwrite, not an insert

        assert!(cache.has("a.rs", None));
        assert!(cache.has("b.rs", None));
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn get_refreshes_lru_order() {
        let mut cache = ContextCache::new(ContextCacheConfig {
            ttl: Duration::from_secs(60),
            max_entries: 2,
        });
        cache.set(make_source("a.rs"));
        cache.set(make_source("b.rs"));
        let _ = cache.get("a.rs", None); // a is now most recent
        cache.set(make_source("c.rs")); // evicts b

        assert!(cache.has("a.rs", None));
        assert!(!cache.has("b.rs", None));
    }

    #[test]
    fn invalidate_removes_all_range_variants() {
        let mut cache = ContextCache::default();
        cache.set(make_source("src/lib.rs"));
        cache.set(make_snippet("src/lib.rs", (1, 50)));
        cache.set(make_snippet("src/lib.rs", (51, 100)));

        cache.invalidate_file("src/lib.rs");

        assert!(!cache.has("src/lib.rs", None));
        assert!(!cache.has("src/lib.rs", Some((1, 50))));
        assert!(!cache.has("src/lib.rs", Some((51, 100))));
    }

    #[test]
    fn invalidate_cascades_to_importers() {
        let mut cache = ContextCache::default();
        cache.set(make_source("a.rs"));
        cache.set(make_source("b.rs"));
        cache.register_dependency("a.rs", "b.rs");

        cache.invalidate_file("b.rs");

        assert!(!cache.has("a.rs", None));
        assert!(!cache.has("b.rs", None));
    }

    #[test]
    fn cascade_handles_cycles() {
        let mut cache = ContextCache::default();
        cache.set(make_source("a.rs"));
        cache.set(make_source("b.rs"));
        cache.register_dependency("a.rs", "b.rs");
        cache.register_dependency("b.rs", "a.rs");

        // Must terminate despite the cycle
        cache.invalidate_file("a.rs");

        assert!(!cache.has("a.rs", None));
        assert!(!cache.has("b.rs", None));
    }

    #[test]
    fn invalidate_transitive_chain() {
        let mut cache = ContextCache::default();
        cache.set(make_source("a.rs"));
        cache.set(make_source("b.rs"));
        cache.set(make_source("c.rs"));
        cache.register_dependency("a.rs", "b.rs");
        cache.register_dependency("b.rs", "c.rs");

        cache.invalidate_file("c.rs");

        assert!(!cache.has("a.rs", None));
        assert!(!cache.has("b.rs", None));
        assert!(!cache.has("c.rs", None));
    }

    #[test]
    fn invalidate_leaves_unrelated_entries() {
        let mut cache = ContextCache::default();
        cache.set(make_source("a.rs"));
        cache.set(make_source("other.rs"));

        cache.invalidate_file("a.rs");

        assert!(cache.has("other.rs", None));
    }

    #[test]
    fn stats_track_hits_misses_and_tokens_saved() {
        let mut cache = ContextCache::default();
        cache.set(make_source("a.rs"));
        let hit = cache.get("a.rs", None).unwrap();
        let _ = cache.get("missing.rs", None);

        let s = cache.stats();
        assert_eq!(s.hits, 1);
        assert_eq!(s.misses, 1);
        assert_eq!(s.tokens_saved, hit.tokens as u64);
        assert!((s.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn clear_resets_everything() {
        let mut cache = ContextCache::default();
        cache.set(make_source("a.rs"));
        cache.register_dependency("b.rs", "a.rs");
        let _ = cache.get("a.rs", None);

        cache.clear();

        let s = cache.stats();
        assert_eq!(s.entries, 0);
        assert_eq!(s.hits, 0);
        assert_eq!(s.tokens_saved, 0);
        assert!(!cache.has("a.rs", None));
    }

    #[test]
    fn watcher_flag_defaults_inactive() {
        let cache = ContextCache::default();
        assert!(!cache.watcher_active());

        let mut cache = cache;
        cache.set_watcher_active(true);
        assert!(cache.stats().watcher_active);
    }
}
