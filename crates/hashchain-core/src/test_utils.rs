//! Test helpers shared by unit and integration tests.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::adapters::memory_storage::MemoryStorage;
use crate::domain::{Block, BlockGroup, ChainError, Payload, StorageError};
use crate::ports::outbound::{BlockLoader, BlockStorage, Clock, ProofEngine};

/// 2024-01-01T00:00:00Z
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Blocks built on top of `tip`, newest first.
pub fn extend_chain(
    engine: &dyn ProofEngine<String>,
    clock: &dyn Clock,
    tip: &Block<String>,
    payloads: &[&str],
) -> Vec<Block<String>> {
    let mut blocks: Vec<Block<String>> = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let predecessor = blocks.last().unwrap_or(tip);
        let block = Block::new(payload.to_string(), predecessor, engine, clock);
        blocks.push(block);
    }
    blocks.reverse();
    blocks
}

/// A full chain from `genesis` through `payloads`, newest first.
pub fn build_chain(
    engine: &dyn ProofEngine<String>,
    clock: &dyn Clock,
    genesis: &str,
    payloads: &[&str],
) -> Vec<Block<String>> {
    let genesis = Block::genesis(genesis.to_string(), engine, clock);
    let mut blocks = extend_chain(engine, clock, &genesis, payloads);
    blocks.push(genesis);
    blocks
}

/// Loader that records every request it forwards.
pub struct CountingLoader<L> {
    inner: L,
    calls: AtomicUsize,
    cursors: Mutex<Vec<String>>,
}

impl<L> CountingLoader<L> {
    /// Wrap `inner`.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            cursors: Mutex::new(Vec::new()),
        }
    }

    /// Requests forwarded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Cursors requested, in order, rendered with `Debug`.
    pub fn cursors(&self) -> Vec<String> {
        self.cursors.lock().clone()
    }
}

impl<D: Payload, L: BlockLoader<D>> BlockLoader<D> for CountingLoader<L> {
    type Cursor = L::Cursor;

    fn head_cursor(&self) -> Self::Cursor {
        self.inner.head_cursor()
    }

    fn load_blocks(
        &self,
        cursor: &Self::Cursor,
        count: usize,
    ) -> Result<(BlockGroup<D>, Self::Cursor), ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().push(format!("{cursor:?}"));
        self.inner.load_blocks(cursor, count)
    }
}

/// Storage with injectable failures.
///
/// Uses the one-block-at-a-time bulk operations, so group failures are
/// partial and report the failing index.
pub struct FailingStorage<D> {
    inner: MemoryStorage<D>,
    stores_left: Option<usize>,
    fail_deletes: bool,
    fail_loads: bool,
}

impl<D: Payload> FailingStorage<D> {
    /// Wrap `inner`; nothing fails until configured.
    pub fn new(inner: MemoryStorage<D>) -> Self {
        Self {
            inner,
            stores_left: None,
            fail_deletes: false,
            fail_loads: false,
        }
    }

    /// Let `n` more stores succeed, then fail every one after.
    pub fn fail_stores_after(&mut self, n: usize) {
        self.stores_left = Some(n);
    }

    /// Fail every delete.
    pub fn fail_deletes(&mut self) {
        self.fail_deletes = true;
    }

    /// Fail `load_last_block`.
    pub fn fail_loads(&mut self) {
        self.fail_loads = true;
    }

    /// Wrapped storage.
    pub fn inner(&self) -> &MemoryStorage<D> {
        &self.inner
    }
}

impl<D: Payload> BlockStorage<D> for FailingStorage<D> {
    fn load_last_block(&self) -> Result<Block<D>, StorageError> {
        if self.fail_loads {
            return Err(StorageError::Backend("injected load failure".into()));
        }
        self.inner.load_last_block()
    }

    fn store_block(&mut self, block: Block<D>) -> Result<(), StorageError> {
        if let Some(left) = self.stores_left.as_mut() {
            if *left == 0 {
                return Err(StorageError::Backend("injected store failure".into()));
            }
            *left -= 1;
        }
        self.inner.store_block(block)
    }

    fn delete_block(&mut self, block: &Block<D>) -> Result<(), StorageError> {
        if self.fail_deletes {
            return Err(StorageError::Backend("injected delete failure".into()));
        }
        self.inner.delete_block(block)
    }
}

impl<D: Payload> BlockLoader<D> for FailingStorage<D> {
    type Cursor = usize;

    fn head_cursor(&self) -> usize {
        0
    }

    fn load_blocks(
        &self,
        cursor: &usize,
        count: usize,
    ) -> Result<(BlockGroup<D>, usize), ChainError> {
        self.inner.load_blocks(cursor, count)
    }
}
