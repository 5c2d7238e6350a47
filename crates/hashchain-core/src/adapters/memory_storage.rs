//! # In-Memory Storage
//!
//! `BTreeMap` keyed by `(timestamp, hash)`, so iteration order is chain
//! order regardless of the order blocks are stored in. Serves both as the
//! durable-storage port and as a loader over its own contents.
//!
//! Loader cursors are offsets from the tip: `0` is the newest block.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::{Block, BlockGroup, ChainError, Payload, StorageError};
use crate::ports::outbound::{BlockLoader, BlockStorage};

type Key = (DateTime<Utc>, String);

fn key_of<D>(block: &Block<D>) -> Key {
    (block.timestamp, block.hash.clone())
}

/// Ordered in-memory block store.
#[derive(Clone, Debug)]
pub struct MemoryStorage<D> {
    blocks: BTreeMap<Key, Block<D>>,
}

impl<D> Default for MemoryStorage<D> {
    fn default() -> Self {
        Self {
            blocks: BTreeMap::new(),
        }
    }
}

impl<D: Payload> MemoryStorage<D> {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `blocks`, in any order.
    pub fn from_blocks(blocks: impl IntoIterator<Item = Block<D>>) -> Self {
        Self {
            blocks: blocks.into_iter().map(|b| (key_of(&b), b)).collect(),
        }
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Whether a block equal to `block` is stored.
    pub fn contains(&self, block: &Block<D>) -> bool {
        self.blocks.get(&key_of(block)) == Some(block)
    }

    /// Snapshot of every block, newest first.
    pub fn blocks_newest_first(&self) -> BlockGroup<D> {
        self.blocks.values().rev().cloned().collect()
    }

    fn find(&self, block: &Block<D>) -> Result<Key, StorageError> {
        let key = key_of(block);
        match self.blocks.get(&key) {
            Some(stored) if stored == block => Ok(key),
            _ => Err(StorageError::BlockNotFound {
                hash: block.hash.clone(),
            }),
        }
    }
}

impl<D: Payload> BlockStorage<D> for MemoryStorage<D> {
    fn load_last_block(&self) -> Result<Block<D>, StorageError> {
        self.blocks
            .values()
            .next_back()
            .cloned()
            .ok_or(StorageError::Empty)
    }

    fn store_block(&mut self, block: Block<D>) -> Result<(), StorageError> {
        self.blocks.insert(key_of(&block), block);
        Ok(())
    }

    fn delete_block(&mut self, block: &Block<D>) -> Result<(), StorageError> {
        let key = self.find(block)?;
        self.blocks.remove(&key);
        Ok(())
    }

    fn store_block_group(&mut self, group: &[Block<D>]) -> Result<(), StorageError> {
        self.blocks
            .extend(group.iter().map(|b| (key_of(b), b.clone())));
        Ok(())
    }

    fn delete_block_group(&mut self, group: &[Block<D>]) -> Result<(), StorageError> {
        // Resolve every key first so a missing block leaves the store untouched.
        let keys = group
            .iter()
            .enumerate()
            .map(|(index, block)| self.find(block).map_err(|e| StorageError::at_index(index, e)))
            .collect::<Result<Vec<_>, _>>()?;
        for key in keys {
            self.blocks.remove(&key);
        }
        Ok(())
    }
}

impl<D: Payload> BlockLoader<D> for MemoryStorage<D> {
    type Cursor = usize;

    fn head_cursor(&self) -> usize {
        0
    }

    fn load_blocks(
        &self,
        cursor: &usize,
        count: usize,
    ) -> Result<(BlockGroup<D>, usize), ChainError> {
        let page: BlockGroup<D> = self
            .blocks
            .values()
            .rev()
            .skip(*cursor)
            .take(count)
            .cloned()
            .collect();
        let next = cursor + page.len();
        Ok((page, next))
    }
}
