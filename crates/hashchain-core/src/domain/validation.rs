//! # Chain Validation
//!
//! Integrity checks over single blocks and newest-first groups, the
//! content-addressed common-block search, and cumulative difficulty.
//!
//! ## Checks
//! 1. Timestamp strictly after the predecessor
//! 2. `prev_hash` equals the predecessor's hash
//! 3. Proof engine accepts the hash
//!
//! Groups are checked oldest block first, so the reported index is the
//! block whose own fields are broken rather than its successor.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::block::{Block, Payload};
use super::errors::ChainError;
use crate::ports::outbound::ProofEngine;

/// How the oldest block of a chunk is anchored.
#[derive(Debug)]
pub enum ChunkBoundary<'a, D> {
    /// Must chain onto this block.
    Predecessor(&'a Block<D>),
    /// No known predecessor: treated as the start of the chain and
    /// validated as a genesis block.
    ChainStart,
    /// Link left to the caller; only the block's own proof is checked.
    Open,
}

/// Selects how the oldest block of a group is validated.
#[derive(Debug)]
pub enum ValidationMode<'a, D> {
    /// The oldest block must be a genesis block.
    AsFullChain,
    /// The oldest block is anchored per the boundary.
    AsChunk(ChunkBoundary<'a, D>),
}

fn check_proof<D: Payload>(block: &Block<D>, engine: &dyn ProofEngine<D>) -> Result<(), ChainError> {
    if engine.validate(block) {
        Ok(())
    } else {
        Err(ChainError::ProofInvalid {
            hash: block.hash.clone(),
        })
    }
}

/// Validate `block` as the direct successor of `predecessor`.
pub fn single_block_is_valid<D: Payload>(
    block: &Block<D>,
    predecessor: &Block<D>,
    engine: &dyn ProofEngine<D>,
) -> Result<(), ChainError> {
    if block.timestamp <= predecessor.timestamp {
        return Err(ChainError::TimestampNotAfterPredecessor {
            timestamp: block.timestamp,
            predecessor: predecessor.timestamp,
        });
    }

    if block.prev_hash != predecessor.hash {
        return Err(ChainError::PrevHashMismatch {
            expected: predecessor.hash.clone(),
            actual: block.prev_hash.clone(),
        });
    }

    check_proof(block, engine)
}

/// Validate `block` as the first block of a chain.
pub fn genesis_block_is_valid<D: Payload>(
    block: &Block<D>,
    engine: &dyn ProofEngine<D>,
) -> Result<(), ChainError> {
    if !block.is_genesis() {
        return Err(ChainError::NotGenesis {
            prev_hash: block.prev_hash.clone(),
        });
    }
    check_proof(block, engine)
}

/// Validate a newest-first group.
///
/// A non-empty `prepended` chunk (newer than `group`) must chain onto
/// `group[0]`. Failures carry the index of the offending block.
pub fn group_is_valid<D: Payload>(
    group: &[Block<D>],
    prepended: &[Block<D>],
    mode: ValidationMode<'_, D>,
    engine: &dyn ProofEngine<D>,
) -> Result<(), ChainError> {
    let Some(oldest_index) = group.len().checked_sub(1) else {
        return Ok(());
    };

    if let Some(boundary) = prepended.last() {
        single_block_is_valid(boundary, &group[0], engine).map_err(|e| {
            ChainError::PrependedChunkInvalid {
                source: Box::new(ChainError::at_index(prepended.len() - 1, e)),
            }
        })?;
    }

    let oldest = &group[oldest_index];
    match mode {
        ValidationMode::AsFullChain | ValidationMode::AsChunk(ChunkBoundary::ChainStart) => {
            genesis_block_is_valid(oldest, engine)
        }
        ValidationMode::AsChunk(ChunkBoundary::Predecessor(predecessor)) => {
            single_block_is_valid(oldest, predecessor, engine)
        }
        ValidationMode::AsChunk(ChunkBoundary::Open) => check_proof(oldest, engine),
    }
    .map_err(|e| ChainError::at_index(oldest_index, e))?;

    for index in (0..oldest_index).rev() {
        single_block_is_valid(&group[index], &group[index + 1], engine)
            .map_err(|e| ChainError::at_index(index, e))?;
    }

    Ok(())
}

/// Timestamp reduced to plain UTC seconds and nanoseconds.
pub fn timestamp_key(timestamp: &DateTime<Utc>) -> (i64, u32) {
    (timestamp.timestamp(), timestamp.timestamp_subsec_nanos())
}

/// First block of `a` (in scan order) that also appears in `b`.
///
/// Blocks match on normalized timestamp, hash and previous hash. A payload
/// mismatch on an otherwise identical block is logged and still matches:
/// the hash is authoritative.
pub fn find_common_block<D: Payload>(a: &[Block<D>], b: &[Block<D>]) -> Option<(usize, usize)> {
    let mut by_timestamp: HashMap<(i64, u32), Vec<usize>> = HashMap::with_capacity(b.len());
    for (index, block) in b.iter().enumerate() {
        by_timestamp
            .entry(timestamp_key(&block.timestamp))
            .or_default()
            .push(index);
    }

    for (index_a, block) in a.iter().enumerate() {
        let Some(candidates) = by_timestamp.get(&timestamp_key(&block.timestamp)) else {
            continue;
        };

        for &index_b in candidates {
            let other = &b[index_b];
            if other.hash != block.hash || other.prev_hash != block.prev_hash {
                continue;
            }
            if other.data != block.data {
                tracing::warn!(
                    hash = %block.hash,
                    index_a,
                    index_b,
                    "Common block payloads differ despite equal hashes"
                );
            }
            return Some((index_a, index_b));
        }
    }

    None
}

/// Sum of per-block difficulty.
pub fn total_difficulty<D: Payload>(
    group: &[Block<D>],
    engine: &dyn ProofEngine<D>,
) -> Result<i64, ChainError> {
    group
        .iter()
        .enumerate()
        .try_fold(0i64, |total, (index, block)| {
            let difficulty = engine
                .difficulty(&block.hash)
                .map_err(|e| ChainError::at_index(index, e))?;
            total
                .checked_add(difficulty)
                .ok_or_else(|| ChainError::at_index(index, ChainError::DifficultyOverflow))
        })
}
