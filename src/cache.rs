//! Bounded result caches.
//!
//! Each tier is an [`LruCache`] read with `peek`, so lookups never refresh
//! an entry and eviction follows insertion order. All tiers belong to one
//! dataset generation and are cleared together.

use crate::query::FilterWarning;
use crate::record::Position;
use lru::LruCache;
use roaring::RoaringBitmap;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

/// One insertion-ordered, bounded cache tier
pub struct QueryCache<V> {
    entries: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.entries.peek(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: String, value: V) {
        self.entries.put(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Age of the entry that will be evicted next
    pub fn oldest_age(&self) -> Option<Duration> {
        self.entries.peek_lru().map(|(_, e)| e.created_at.elapsed())
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            entries: self.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Size and hit counters of one tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Final result of a whole query
#[derive(Debug, Clone)]
pub struct CompositeEntry {
    pub positions: Arc<[Position]>,
    pub warnings: Arc<[FilterWarning]>,
}

/// The four cache tiers of an engine
pub struct CacheManager {
    /// Search words to positions
    pub search: QueryCache<Arc<RoaringBitmap>>,
    /// Normalized predicates to positions over the whole dataset
    pub filter: QueryCache<Arc<RoaringBitmap>>,
    /// Normalized full query to ordered positions
    pub sorted: QueryCache<Arc<[Position]>>,
    /// Raw query encoding to the final result
    pub composite: QueryCache<CompositeEntry>,
}

impl CacheManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            search: QueryCache::new(capacity),
            filter: QueryCache::new(capacity),
            sorted: QueryCache::new(capacity),
            composite: QueryCache::new(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.search.clear();
        self.filter.clear();
        self.sorted.clear();
        self.composite.clear();
    }

    pub fn sizes(&self) -> CacheSizes {
        CacheSizes {
            search: self.search.stats(),
            filter: self.filter.stats(),
            sorted: self.sorted.stats(),
            composite: self.composite.stats(),
        }
    }
}

/// Per-tier statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSizes {
    pub search: TierStats,
    pub filter: TierStats,
    pub sorted: TierStats,
    pub composite: TierStats,
}

impl CacheSizes {
    pub fn total_entries(&self) -> usize {
        self.search.entries + self.filter.entries + self.sorted.entries + self.composite.entries
    }
}
