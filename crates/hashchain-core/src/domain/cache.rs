//! # Page Cache (LRU)
//!
//! Fixed-capacity, recency-ordered map used to memoize loader pages.
//!
//! Backed by [`lru::LruCache`]: an indexed doubly-linked list with O(1)
//! lookup, promotion and eviction of the least recently used entry.
//!
//! Not synchronized: wrap in a lock when shared across threads.

use std::hash::Hash;
use std::num::NonZeroUsize;

use super::block::BlockGroup;

/// Least-recently-used cache with a fixed capacity.
pub struct LruCache<K: Hash + Eq, V> {
    entries: lru::LruCache<K, V>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Create an empty cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: lru::LruCache::new(capacity),
        }
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// Insert or replace `key`, marking it most recently used.
    ///
    /// Returns the evicted key when the insert pushed the cache over capacity.
    pub fn set(&mut self, key: K, value: V) -> Option<K> {
        // `push` also hands back the old pair when `key` was already present.
        match self.entries.push(key.clone(), value) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }

    /// Whether `key` is cached. Does not touch recency.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Cache key for one loader page.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkKey<C> {
    /// Cursor the page was requested at.
    pub cursor: C,
    /// Requested page size.
    pub count: usize,
}

impl<C> ChunkKey<C> {
    /// Create a key.
    pub fn new(cursor: C, count: usize) -> Self {
        Self { cursor, count }
    }
}

/// Cached result of one loader page.
#[derive(Clone, Debug)]
pub struct CachedChunk<D, C> {
    /// Blocks, newest first.
    pub blocks: BlockGroup<D>,
    /// Cursor of the following page.
    pub next_cursor: C,
}

/// Cache statistics for monitoring.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups delegated to the wrapped loader.
    pub misses: u64,
    /// Entries currently held.
    pub entries: usize,
    /// Maximum entries.
    pub capacity: usize,
}
