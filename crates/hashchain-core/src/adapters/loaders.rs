//! # Loader Decorators
//!
//! Composable wrappers around any [`BlockLoader`]. Each forwards the
//! cursor protocol unchanged and adds one concern:
//!
//! - [`ChunkValidatingLoader`]: every page must be internally consistent
//! - [`LastBlockValidatingLoader`]: the oldest block of a page must chain
//!   onto the next page (or be genesis when there is none)
//! - [`MemoizingLoader`]: repeated `(cursor, count)` requests hit an LRU
//!
//! The usual stack, innermost first:
//! `MemoizingLoader(ChunkValidatingLoader(source))` wrapped by
//! `LastBlockValidatingLoader`, whose lookahead then costs a cache hit.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::{
    genesis_block_is_valid, group_is_valid, single_block_is_valid, BlockGroup, CacheStats,
    CachedChunk, ChainError, ChunkBoundary, ChunkKey, LruCache, Payload, ValidationMode,
};
use crate::ports::outbound::{BlockLoader, ProofEngine};

/// Rejects pages whose blocks do not chain onto each other.
///
/// Only links inside the page are checked; the oldest block's own proof is
/// checked but its predecessor is not.
pub struct ChunkValidatingLoader<L, D: Payload> {
    inner: L,
    engine: Arc<dyn ProofEngine<D>>,
}

impl<L, D: Payload> ChunkValidatingLoader<L, D> {
    /// Wrap `inner`.
    pub fn new(inner: L, engine: Arc<dyn ProofEngine<D>>) -> Self {
        Self { inner, engine }
    }

    /// Wrapped loader.
    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: BlockLoader<D>, D: Payload> BlockLoader<D> for ChunkValidatingLoader<L, D> {
    type Cursor = L::Cursor;

    fn head_cursor(&self) -> Self::Cursor {
        self.inner.head_cursor()
    }

    fn load_blocks(
        &self,
        cursor: &Self::Cursor,
        count: usize,
    ) -> Result<(BlockGroup<D>, Self::Cursor), ChainError> {
        let (page, next) = self.inner.load_blocks(cursor, count)?;

        group_is_valid(
            &page,
            &[],
            ValidationMode::AsChunk(ChunkBoundary::Open),
            self.engine.as_ref(),
        )
        .map_err(|e| {
            tracing::warn!(?cursor, error = %e, "Rejected invalid chunk");
            ChainError::load(cursor, e)
        })?;

        Ok((page, next))
    }
}

/// Checks the oldest block of every page against the page that follows.
///
/// Fetches one page ahead with the same `count`. An empty lookahead means
/// the page reaches the start of the chain, so its oldest block must be a
/// genesis block.
pub struct LastBlockValidatingLoader<L, D: Payload> {
    inner: L,
    engine: Arc<dyn ProofEngine<D>>,
}

impl<L, D: Payload> LastBlockValidatingLoader<L, D> {
    /// Wrap `inner`.
    pub fn new(inner: L, engine: Arc<dyn ProofEngine<D>>) -> Self {
        Self { inner, engine }
    }

    /// Wrapped loader.
    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: BlockLoader<D>, D: Payload> BlockLoader<D> for LastBlockValidatingLoader<L, D> {
    type Cursor = L::Cursor;

    fn head_cursor(&self) -> Self::Cursor {
        self.inner.head_cursor()
    }

    fn load_blocks(
        &self,
        cursor: &Self::Cursor,
        count: usize,
    ) -> Result<(BlockGroup<D>, Self::Cursor), ChainError> {
        let (page, next) = self.inner.load_blocks(cursor, count)?;
        let Some(oldest) = page.last() else {
            return Ok((page, next));
        };

        let (lookahead, _) = self.inner.load_blocks(&next, count)?;
        let engine = self.engine.as_ref();
        let checked = match lookahead.first() {
            Some(predecessor) => single_block_is_valid(oldest, predecessor, engine),
            None => genesis_block_is_valid(oldest, engine),
        };

        checked.map_err(|e| {
            tracing::warn!(?cursor, error = %e, "Rejected chunk boundary");
            ChainError::load(cursor, ChainError::at_index(page.len() - 1, e))
        })?;

        Ok((page, next))
    }
}

/// LRU-memoizing loader.
///
/// Successful pages, empty ones included, are cached per `(cursor, count)`.
/// Errors are never cached.
///
/// Concurrent misses on the same `(cursor, count)` are coalesced: one caller
/// fetches from the wrapped loader while the others wait on a per-key gate
/// and then read the cached page.
pub struct MemoizingLoader<L: BlockLoader<D>, D: Payload> {
    inner: L,
    cache: Mutex<LruCache<ChunkKey<L::Cursor>, CachedChunk<D, L::Cursor>>>,
    in_flight: Mutex<HashMap<ChunkKey<L::Cursor>, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<L: BlockLoader<D>, D: Payload> MemoizingLoader<L, D> {
    /// Wrap `inner` with a cache of `capacity` pages.
    pub fn new(inner: L, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Wrapped loader.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Hit/miss counters and occupancy.
    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: cache.len(),
            capacity: cache.capacity(),
        }
    }

    /// Drop every cached page.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl<L: BlockLoader<D>, D: Payload> BlockLoader<D> for MemoizingLoader<L, D> {
    type Cursor = L::Cursor;

    fn head_cursor(&self) -> Self::Cursor {
        self.inner.head_cursor()
    }

    fn load_blocks(
        &self,
        cursor: &Self::Cursor,
        count: usize,
    ) -> Result<(BlockGroup<D>, Self::Cursor), ChainError> {
        let key = ChunkKey::new(cursor.clone(), count);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let gate = Arc::clone(self.in_flight.lock().entry(key.clone()).or_default());
        let result = {
            let _guard = gate.lock();
            match self.cached(&key) {
                Some(hit) => Ok(hit),
                None => self.fetch(key.clone()),
            }
        };

        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&key).is_some_and(|g| Arc::ptr_eq(g, &gate)) {
            in_flight.remove(&key);
        }

        result
    }
}

impl<L: BlockLoader<D>, D: Payload> MemoizingLoader<L, D> {
    fn cached(&self, key: &ChunkKey<L::Cursor>) -> Option<(BlockGroup<D>, L::Cursor)> {
        let hit = self.cache.lock().get(key)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(cursor = ?key.cursor, count = key.count, "Chunk cache hit");
        Some((hit.blocks, hit.next_cursor))
    }

    fn fetch(&self, key: ChunkKey<L::Cursor>) -> Result<(BlockGroup<D>, L::Cursor), ChainError> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(cursor = ?key.cursor, count = key.count, "Chunk cache miss");

        let (blocks, next_cursor) = self.inner.load_blocks(&key.cursor, key.count)?;
        let chunk = CachedChunk {
            blocks: blocks.clone(),
            next_cursor: next_cursor.clone(),
        };
        if let Some(evicted) = self.cache.lock().set(key, chunk) {
            tracing::debug!(cursor = ?evicted.cursor, "Evicted cached chunk");
        }

        Ok((blocks, next_cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::SteppingClock;
    use crate::adapters::memory_storage::MemoryStorage;
    use crate::algorithms::IdentityProof;
    use crate::domain::Block;
    use crate::test_utils::{build_chain, start_time, CountingLoader};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn engine() -> Arc<dyn ProofEngine<String>> {
        Arc::new(IdentityProof)
    }

    fn chain(len: usize) -> Vec<Block<String>> {
        let clock = SteppingClock::hourly(start_time());
        let payloads: Vec<String> = (1..len).map(|i| format!("block #{i}")).collect();
        let refs: Vec<&str> = payloads.iter().map(String::as_str).collect();
        build_chain(&IdentityProof, &clock, "genesis", &refs)
    }

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// Loader that sleeps before every page, widening the miss window.
    struct SlowLoader<L> {
        inner: L,
        delay: Duration,
    }

    impl<L: BlockLoader<String>> BlockLoader<String> for SlowLoader<L> {
        type Cursor = L::Cursor;

        fn head_cursor(&self) -> Self::Cursor {
            self.inner.head_cursor()
        }

        fn load_blocks(
            &self,
            cursor: &Self::Cursor,
            count: usize,
        ) -> Result<(BlockGroup<String>, Self::Cursor), ChainError> {
            thread::sleep(self.delay);
            self.inner.load_blocks(cursor, count)
        }
    }

    #[test]
    fn test_chunk_validation_passes_valid_pages() {
        let blocks = chain(7);
        let loader = ChunkValidatingLoader::new(MemoryStorage::from_blocks(blocks.clone()), engine());

        let (page, next) = loader.load_blocks(&2, 3).unwrap();
        assert_eq!(page, blocks[2..5].to_vec());
        assert_eq!(next, 5);
    }

    #[test]
    fn test_chunk_validation_reports_cursor_and_index() {
        let mut blocks = chain(7);
        blocks[3].data = "tampered".to_string();
        let loader = ChunkValidatingLoader::new(MemoryStorage::from_blocks(blocks), engine());

        let err = loader.load_blocks(&2, 3).unwrap_err();
        assert!(matches!(err, ChainError::Load { ref cursor, .. } if cursor == "2"));
        assert_eq!(err.block_index(), Some(1));
        assert!(matches!(err.root(), ChainError::ProofInvalid { .. }));

        assert!(loader.load_blocks(&4, 3).is_ok());
    }

    #[test]
    fn test_last_block_checked_against_lookahead() {
        let mut blocks = chain(6);
        blocks[3].prev_hash = "detached".to_string();
        let loader = LastBlockValidatingLoader::new(MemoryStorage::from_blocks(blocks), engine());

        assert!(loader.load_blocks(&0, 2).is_ok());
        let err = loader.load_blocks(&2, 2).unwrap_err();
        assert_eq!(err.block_index(), Some(1));
        assert!(matches!(err.root(), ChainError::PrevHashMismatch { .. }));
    }

    #[test]
    fn test_last_page_requires_genesis() {
        let blocks = chain(5);
        let storage = MemoryStorage::from_blocks(blocks[..4].to_vec());
        let loader = LastBlockValidatingLoader::new(storage, engine());

        let err = loader.load_blocks(&2, 2).unwrap_err();
        assert!(matches!(err.root(), ChainError::NotGenesis { .. }));

        let full = LastBlockValidatingLoader::new(MemoryStorage::from_blocks(blocks), engine());
        let (page, _) = full.load_blocks(&3, 2).unwrap();
        assert!(page[1].is_genesis());
        assert!(full.load_blocks(&5, 2).unwrap().0.is_empty());
    }

    #[test]
    fn test_memoizing_loader_hits() {
        let blocks = chain(6);
        let loader: MemoizingLoader<_, String> = MemoizingLoader::new(
            CountingLoader::new(MemoryStorage::from_blocks(blocks.clone())),
            capacity(4),
        );

        let first = loader.load_blocks(&0, 3).unwrap();
        let second = loader.load_blocks(&0, 3).unwrap();
        assert_eq!(first, second);
        assert_eq!(loader.inner().calls(), 1);

        loader.load_blocks(&0, 2).unwrap();
        assert_eq!(loader.inner().calls(), 2);

        let stats = loader.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.capacity, 4);
    }

    #[test]
    fn test_memoizing_loader_evicts_least_recent() {
        let blocks = chain(6);
        let loader: MemoizingLoader<_, String> = MemoizingLoader::new(
            CountingLoader::new(MemoryStorage::from_blocks(blocks)),
            capacity(2),
        );

        loader.load_blocks(&0, 1).unwrap();
        loader.load_blocks(&1, 1).unwrap();
        loader.load_blocks(&0, 1).unwrap();
        loader.load_blocks(&2, 1).unwrap();
        assert_eq!(loader.inner().calls(), 3);

        loader.load_blocks(&0, 1).unwrap();
        assert_eq!(loader.inner().calls(), 3);
        loader.load_blocks(&1, 1).unwrap();
        assert_eq!(loader.inner().calls(), 4);
    }

    #[test]
    fn test_memoizing_loader_does_not_cache_errors() {
        let mut blocks = chain(4);
        blocks[1].hash = "bad".to_string();
        let loader: MemoizingLoader<_, String> = MemoizingLoader::new(
            ChunkValidatingLoader::new(
                CountingLoader::new(MemoryStorage::from_blocks(blocks)),
                engine(),
            ),
            capacity(4),
        );

        assert!(loader.load_blocks(&0, 2).is_err());
        assert!(loader.load_blocks(&0, 2).is_err());
        assert_eq!(loader.inner().inner().calls(), 2);
        assert_eq!(loader.stats().entries, 0);
    }

    #[test]
    fn test_memoizing_loader_clear_forces_refetch() {
        let loader: MemoizingLoader<_, String> = MemoizingLoader::new(
            CountingLoader::new(MemoryStorage::from_blocks(chain(4))),
            capacity(4),
        );

        let before = loader.load_blocks(&0, 2).unwrap();
        loader.clear();
        assert_eq!(loader.stats().entries, 0);

        let after = loader.load_blocks(&0, 2).unwrap();
        assert_eq!(before, after);
        assert_eq!(loader.inner().calls(), 2);
        assert_eq!(loader.stats().misses, 2);
    }

    #[test]
    fn test_concurrent_misses_fetch_once() {
        const THREADS: usize = 4;
        let loader: MemoizingLoader<_, String> = MemoizingLoader::new(
            CountingLoader::new(SlowLoader {
                inner: MemoryStorage::from_blocks(chain(6)),
                delay: Duration::from_millis(100),
            }),
            capacity(4),
        );
        let barrier = Barrier::new(THREADS);

        let pages: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        loader.load_blocks(&0, 2).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loader.inner().calls(), 1);
        assert!(pages.windows(2).all(|w| w[0] == w[1]));
        let stats = loader.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, THREADS as u64 - 1);
        assert!(loader.in_flight.lock().is_empty());
    }
}
