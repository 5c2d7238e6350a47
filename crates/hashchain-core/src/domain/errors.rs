//! # Domain Errors
//!
//! Error types for the hash-chain core.
//!
//! ## Taxonomy
//!
//! | Kind | Variants |
//! |------|----------|
//! | Integrity | `TimestampNotAfterPredecessor`, `PrevHashMismatch`, `ProofInvalid`, `NotGenesis`, `MalformedHash` |
//! | Configuration | `MissingGenesis`, `InvalidConfig` |
//! | Ambiguity | `EqualDifficulties` |
//! | Collaborator | `Storage`, `Load`, `Merge` |
//! | Divergence | `NoCommonBlock` |
//!
//! Integrity errors are always wrapped in `InvalidBlock` with the offending
//! index before they leave a group-level operation.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Errors reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No block has been stored yet.
    #[error("Storage is empty")]
    Empty,

    /// The block to delete is not present (or differs from the stored copy).
    #[error("Block not found: {hash}")]
    BlockNotFound {
        /// Hash of the missing block
        hash: String,
    },

    /// A bulk operation failed on one block of the group.
    #[error("Block {index} of group failed: {source}")]
    AtIndex {
        /// Position of the failing block in the group (newest-first)
        index: usize,
        /// Underlying failure
        source: Box<StorageError>,
    },

    /// Backend-specific failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Attach a group index to a per-block failure.
    pub fn at_index(index: usize, source: StorageError) -> Self {
        StorageError::AtIndex {
            index,
            source: Box::new(source),
        }
    }
}

/// Stage of a fork resolution, attached to merge failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    /// Searching for the common block.
    DivergenceSearch,
    /// Summing the local-only prefix.
    LocalDifficulty,
    /// Summing the alternate-only prefix.
    AlternateDifficulty,
    /// Checking the alternate-only prefix links to the common block.
    ValidateAlternate,
    /// Removing the local-only prefix from storage.
    DeleteLocal,
    /// Writing the alternate-only prefix to storage.
    StoreAlternate,
    /// Reading the new tip back from storage.
    ReloadTip,
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStage::DivergenceSearch => "divergence search",
            MergeStage::LocalDifficulty => "local difficulty",
            MergeStage::AlternateDifficulty => "alternate difficulty",
            MergeStage::ValidateAlternate => "alternate prefix validation",
            MergeStage::DeleteLocal => "local prefix deletion",
            MergeStage::StoreAlternate => "alternate prefix store",
            MergeStage::ReloadTip => "tip reload",
        };
        f.write_str(name)
    }
}

/// Hash-chain error types.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Block is not strictly newer than its predecessor.
    #[error("Timestamp {timestamp} is not after predecessor timestamp {predecessor}")]
    TimestampNotAfterPredecessor {
        /// Timestamp of the checked block
        timestamp: DateTime<Utc>,
        /// Timestamp of its predecessor
        predecessor: DateTime<Utc>,
    },

    /// Block does not reference its predecessor's hash.
    #[error("Previous hash mismatch: expected {expected:?}, got {actual:?}")]
    PrevHashMismatch {
        /// Hash of the predecessor
        expected: String,
        /// `prev_hash` found in the block
        actual: String,
    },

    /// Proof engine rejected the block's hash.
    #[error("Proof invalid for hash {hash:?}")]
    ProofInvalid {
        /// Rejected hash
        hash: String,
    },

    /// Block expected to start the chain has a predecessor.
    #[error("Genesis block must have an empty previous hash, got {prev_hash:?}")]
    NotGenesis {
        /// Non-empty previous hash
        prev_hash: String,
    },

    /// Hash string does not follow the proof scheme's encoding.
    #[error("Malformed hash {hash:?}: {reason}")]
    MalformedHash {
        /// Offending hash
        hash: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// Difficulty does not fit the accumulator.
    #[error("Difficulty overflow")]
    DifficultyOverflow,

    /// Integrity failure on a specific block of a group.
    #[error("Block {index} invalid: {source}")]
    InvalidBlock {
        /// Position in the group (newest-first)
        index: usize,
        /// Underlying failure
        source: Box<ChainError>,
    },

    /// The chunk placed in front of a group does not chain onto it.
    #[error("Prepended chunk invalid: {source}")]
    PrependedChunkInvalid {
        /// Underlying failure
        source: Box<ChainError>,
    },

    /// Empty storage and nothing to bootstrap it with.
    #[error("Storage is empty and no genesis payload was supplied")]
    MissingGenesis,

    /// Both fork sides weigh the same; the caller has to pick.
    #[error("Fork difficulties are equal ({difficulty}); refusing to choose a side")]
    EqualDifficulties {
        /// Shared difficulty
        difficulty: i64,
    },

    /// The chains share no block within the searched range.
    #[error("Chains share no common block")]
    NoCommonBlock,

    /// Loading or storing a page failed.
    #[error("Loading at cursor {cursor} failed: {source}")]
    Load {
        /// Cursor in effect, rendered with `Debug`
        cursor: String,
        /// Underlying failure
        source: Box<ChainError>,
    },

    /// Fork resolution failed part way.
    #[error("Merge failed during {stage}: {source}")]
    Merge {
        /// Stage that failed
        stage: MergeStage,
        /// Underlying failure
        source: Box<ChainError>,
    },

    /// Storage collaborator failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Rejected configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChainError {
    /// Attach a group index to a per-block failure.
    pub fn at_index(index: usize, source: ChainError) -> Self {
        ChainError::InvalidBlock {
            index,
            source: Box::new(source),
        }
    }

    /// Attach a cursor to a loading failure.
    pub fn load<C: fmt::Debug>(cursor: &C, source: ChainError) -> Self {
        ChainError::Load {
            cursor: format!("{cursor:?}"),
            source: Box::new(source),
        }
    }

    /// Attach a merge stage to a failure.
    pub fn merge(stage: MergeStage, source: impl Into<ChainError>) -> Self {
        ChainError::Merge {
            stage,
            source: Box::new(source.into()),
        }
    }

    /// Index of the first block reported invalid, looking through wrappers.
    pub fn block_index(&self) -> Option<usize> {
        match self {
            ChainError::InvalidBlock { index, .. } => Some(*index),
            ChainError::PrependedChunkInvalid { source }
            | ChainError::Load { source, .. }
            | ChainError::Merge { source, .. } => source.block_index(),
            _ => None,
        }
    }

    /// The innermost error, with every contextual wrapper removed.
    pub fn root(&self) -> &ChainError {
        match self {
            ChainError::InvalidBlock { source, .. }
            | ChainError::PrependedChunkInvalid { source }
            | ChainError::Load { source, .. }
            | ChainError::Merge { source, .. } => source.root(),
            other => other,
        }
    }
}
