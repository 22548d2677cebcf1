//! Bounded LRU cache for resolved transclusions.
//!
//! One cache instance belongs to one open document and lives as long as
//! that document's viewing session. Entries are keyed by directive
//! identity ([`Directive::cache_key`]) and hold the transformed content
//! plus provenance, so a hit can skip link resolution, loading, parsing,
//! locating, and transforming entirely.
//!
//! The design is a map plus an explicit recency list (least-recently-used
//! at the front), both guarded by a single mutex so concurrent resolutions
//! in the same document keep the LRU bookkeeping consistent.

use crate::directive::Directive;
use crate::resolve::DataSource;
use orgview_types::OrgNode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A resolved transclusion held by the cache. Content is immutable once
/// stored; callers get clones, never aliases into a live document.
#[derive(Clone)]
pub struct CacheEntry {
    /// Transformed content, ready for display.
    pub content: OrgNode,

    /// Identity of the target location (`scheme + body`).
    pub source_id: String,

    /// The resolved source the content was loaded from.
    pub source: Arc<dyn DataSource>,

    /// Navigation target for jumping a viewer to the resolved location.
    pub target_section: Option<String>,

    /// When the entry was stored.
    pub loaded_at: Instant,
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("source_id", &self.source_id)
            .field("source", &self.source.id())
            .field("target_section", &self.target_section)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys ordered least- to most-recently used.
    recency: Vec<String>,
}

impl CacheState {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push(key.to_string());
    }
}

/// Bounded, LRU-evicting store of resolved transclusions.
pub struct TransclusionCache {
    max_size: usize,
    state: Mutex<CacheState>,
}

impl TransclusionCache {
    pub const DEFAULT_MAX_SIZE: usize = 50;

    pub fn new() -> Self {
        Self::with_max_size(Self::DEFAULT_MAX_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Look up by directive identity. A hit promotes the key to
    /// most-recently-used.
    pub fn get(&self, directive: &Directive) -> Option<CacheEntry> {
        let key = directive.cache_key();
        let mut state = self.state.lock();
        if state.entries.contains_key(&key) {
            state.touch(&key);
            state.entries.get(&key).cloned()
        } else {
            None
        }
    }

    /// Insert or overwrite the entry for a directive. When a new key would
    /// push the cache past its bound, the single least-recently-used entry
    /// is evicted first.
    pub fn put(
        &self,
        directive: &Directive,
        content: OrgNode,
        source_id: impl Into<String>,
        source: Arc<dyn DataSource>,
        target_section: Option<String>,
    ) {
        let key = directive.cache_key();
        let mut state = self.state.lock();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            if !state.recency.is_empty() {
                let evicted = state.recency.remove(0);
                state.entries.remove(&evicted);
                debug!(source_id = %evicted, "evicted least-recently-used transclusion");
            }
        }

        state.entries.insert(
            key.clone(),
            CacheEntry {
                content,
                source_id: source_id.into(),
                source,
                target_section,
                loaded_at: Instant::now(),
            },
        );
        state.touch(&key);
    }

    /// Drop every entry loaded from the given source, e.g. after the source
    /// file was modified externally. Linear in cache size.
    pub fn invalidate(&self, source_id: &str) {
        let mut state = self.state.lock();
        let stale: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.source_id == source_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            state.entries.remove(key);
            if let Some(pos) = state.recency.iter().position(|k| k == key) {
                state.recency.remove(pos);
            }
        }
        if !stale.is_empty() {
            debug!(source_id, count = stale.len(), "invalidated cached transclusions");
        }
    }

    /// Empty the cache, e.g. when the owning document closes.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TransclusionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransclusionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TransclusionCache")
            .field("max_size", &self.max_size)
            .field("len", &state.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::tests::FakeSource;
    use orgview_types::MetaNode;

    fn directive(target: &str) -> Directive {
        Directive::try_parse(&MetaNode::new("#+transclude:", format!("[[{target}]]")))
            .expect("valid directive")
    }

    fn source(id: &str) -> Arc<dyn DataSource> {
        Arc::new(FakeSource::new(id, id, ""))
    }

    fn put(cache: &TransclusionCache, target: &str, source_id: &str) {
        cache.put(
            &directive(target),
            OrgNode::Text(target.to_string()),
            source_id,
            source(source_id),
            None,
        );
    }

    #[test]
    fn test_get_returns_stored_content() {
        let cache = TransclusionCache::new();
        put(&cache, "id:a", "id:a");
        let entry = cache.get(&directive("id:a")).unwrap();
        assert_eq!(entry.content, OrgNode::Text("id:a".into()));
        assert_eq!(entry.source_id, "id:a");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction_keeps_last_three() {
        let cache = TransclusionCache::with_max_size(3);
        for target in ["id:1", "id:2", "id:3", "id:4", "id:5"] {
            put(&cache, target, target);
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&directive("id:1")).is_none());
        assert!(cache.get(&directive("id:2")).is_none());
        for target in ["id:3", "id:4", "id:5"] {
            assert!(cache.get(&directive(target)).is_some(), "{target} evicted");
        }
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = TransclusionCache::with_max_size(2);
        put(&cache, "id:a", "id:a");
        put(&cache, "id:b", "id:b");
        // Touch "a" so "b" becomes the eviction candidate.
        cache.get(&directive("id:a")).unwrap();
        put(&cache, "id:c", "id:c");
        assert!(cache.get(&directive("id:a")).is_some());
        assert!(cache.get(&directive("id:b")).is_none());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = TransclusionCache::with_max_size(2);
        put(&cache, "id:a", "id:a");
        put(&cache, "id:b", "id:b");
        put(&cache, "id:a", "id:a");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&directive("id:b")).is_some());
    }

    #[test]
    fn test_invalidate_is_scoped_to_source() {
        let cache = TransclusionCache::new();
        put(&cache, "id:a", "shared.org");
        put(&cache, "id:b", "shared.org");
        put(&cache, "id:c", "other.org");

        cache.invalidate("shared.org");

        assert!(cache.get(&directive("id:a")).is_none());
        assert!(cache.get(&directive("id:b")).is_none());
        assert!(cache.get(&directive("id:c")).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let cache = TransclusionCache::new();
        put(&cache, "id:a", "id:a");
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&directive("id:a")).is_none());
    }
}
