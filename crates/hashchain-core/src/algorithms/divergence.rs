//! # Divergence Search
//!
//! Walks two newest-first block sources in lockstep, one chunk per side per
//! round, until a block present on both sides is found.
//!
//! Chunks are accumulated, so forks of different depth on each side are
//! still found: a match between local chunk `k` and alternate chunk `m`
//! surfaces as soon as both have been pulled. The search ends with
//! `NoCommonBlock` only once both sources are exhausted.

use crate::domain::{find_common_block, Block, BlockGroup, ChainError, Payload};
use crate::ports::outbound::BlockLoader;

/// Where two chains part ways.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Divergence<D> {
    /// Blocks only the local chain has, newest first.
    pub left: BlockGroup<D>,
    /// Blocks only the alternate chain has, newest first.
    pub right: BlockGroup<D>,
    /// Newest block both chains share.
    pub common: Block<D>,
}

impl<D> Divergence<D> {
    /// Whether both chains end at the common block.
    pub fn in_sync(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

struct Side<'a, L: BlockLoader<D>, D: Payload> {
    loader: &'a L,
    cursor: L::Cursor,
    blocks: BlockGroup<D>,
    exhausted: bool,
}

impl<'a, L: BlockLoader<D>, D: Payload> Side<'a, L, D> {
    fn new(loader: &'a L) -> Self {
        Self {
            cursor: loader.head_cursor(),
            loader,
            blocks: Vec::new(),
            exhausted: false,
        }
    }

    /// Pull the next chunk; returns whether any block arrived.
    fn pull(&mut self, chunk_size: usize) -> Result<bool, ChainError> {
        if self.exhausted {
            return Ok(false);
        }
        let (chunk, next) = self.loader.load_blocks(&self.cursor, chunk_size)?;
        if chunk.is_empty() {
            self.exhausted = true;
            return Ok(false);
        }
        self.blocks.extend(chunk);
        self.cursor = next;
        Ok(true)
    }
}

/// Find the newest block shared by `local` and `alternate`.
pub fn find_divergence<D, L, A>(
    local: &L,
    alternate: &A,
    chunk_size: usize,
) -> Result<Divergence<D>, ChainError>
where
    D: Payload,
    L: BlockLoader<D>,
    A: BlockLoader<D>,
{
    if chunk_size == 0 {
        return Err(ChainError::InvalidConfig(
            "chunk size must be positive".to_string(),
        ));
    }

    let mut left = Side::new(local);
    let mut right = Side::new(alternate);
    let mut rounds = 0usize;

    loop {
        let left_grew = left.pull(chunk_size)?;
        let right_grew = right.pull(chunk_size)?;
        rounds += 1;

        if !left_grew && !right_grew {
            tracing::debug!(
                rounds,
                local_blocks = left.blocks.len(),
                alternate_blocks = right.blocks.len(),
                "Divergence search exhausted both chains"
            );
            return Err(ChainError::NoCommonBlock);
        }

        if let Some((l, r)) = find_common_block(&left.blocks, &right.blocks) {
            tracing::debug!(
                rounds,
                local_only = l,
                alternate_only = r,
                "Found common block"
            );
            let common = left.blocks[l].clone();
            left.blocks.truncate(l);
            right.blocks.truncate(r);
            return Ok(Divergence {
                left: left.blocks,
                right: right.blocks,
                common,
            });
        }
    }
}
