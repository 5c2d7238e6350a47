//! # Outbound Ports
//!
//! Capabilities the core consumes: proof scheme, durable storage, paged
//! block sources and a clock.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::hash::Hash;

use crate::domain::{Block, BlockGroup, ChainError, Payload, StorageError};

/// Proof scheme: computes, validates and weighs block hashes.
pub trait ProofEngine<D: Payload>: Send + Sync {
    /// Compute the hash of `block` (its own `hash` field is ignored).
    fn hash(&self, block: &Block<D>) -> String;

    /// Check `block.hash` against the block's content.
    ///
    /// Malformed hashes validate as `false`.
    fn validate(&self, block: &Block<D>) -> bool;

    /// Fork-choice weight of a hash.
    fn difficulty(&self, hash: &str) -> Result<i64, ChainError>;
}

/// Source of block timestamps.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Durable block storage.
///
/// The bulk operations default to one block at a time and report the first
/// failing index; backends override them when they can apply a group
/// atomically.
pub trait BlockStorage<D: Payload>: Send + Sync {
    /// Newest stored block, or `StorageError::Empty`.
    fn load_last_block(&self) -> Result<Block<D>, StorageError>;

    /// Persist one block.
    fn store_block(&mut self, block: Block<D>) -> Result<(), StorageError>;

    /// Remove a block equal to `block`.
    fn delete_block(&mut self, block: &Block<D>) -> Result<(), StorageError>;

    /// Persist a newest-first group, oldest block first.
    fn store_block_group(&mut self, group: &[Block<D>]) -> Result<(), StorageError> {
        for (index, block) in group.iter().enumerate().rev() {
            self.store_block(block.clone())
                .map_err(|e| StorageError::at_index(index, e))?;
        }
        Ok(())
    }

    /// Remove every block of a group.
    fn delete_block_group(&mut self, group: &[Block<D>]) -> Result<(), StorageError> {
        for (index, block) in group.iter().enumerate() {
            self.delete_block(block)
                .map_err(|e| StorageError::at_index(index, e))?;
        }
        Ok(())
    }
}

/// Opaque pagination token. Callers pass it back unmodified.
pub trait Cursor: Clone + Debug + Eq + Hash + Send + Sync + 'static {}

impl<T: Clone + Debug + Eq + Hash + Send + Sync + 'static> Cursor for T {}

/// Cursor-paginated block source.
///
/// Pages are newest first; an empty page marks the end of the data.
pub trait BlockLoader<D: Payload>: Send + Sync {
    /// Loader-defined cursor type.
    type Cursor: Cursor;

    /// Cursor addressing the newest block.
    fn head_cursor(&self) -> Self::Cursor;

    /// Load up to `count` blocks at `cursor`, returning the next cursor.
    fn load_blocks(
        &self,
        cursor: &Self::Cursor,
        count: usize,
    ) -> Result<(BlockGroup<D>, Self::Cursor), ChainError>;
}

impl<D: Payload, L: BlockLoader<D>> BlockLoader<D> for &L {
    type Cursor = L::Cursor;

    fn head_cursor(&self) -> Self::Cursor {
        (**self).head_cursor()
    }

    fn load_blocks(
        &self,
        cursor: &Self::Cursor,
        count: usize,
    ) -> Result<(BlockGroup<D>, Self::Cursor), ChainError> {
        (**self).load_blocks(cursor, count)
    }
}
