//! # Inbound Ports
//!
//! API of the chain orchestrator.

use crate::domain::{Block, ChainError, MergeOutcome, Payload};
use crate::ports::outbound::BlockLoader;

/// Chain orchestrator API.
pub trait ChainApi<D: Payload> {
    /// Current authoritative tip.
    fn tip(&self) -> &Block<D>;

    /// Append a block carrying `payload` on top of the tip.
    ///
    /// The tip only moves once the block is stored.
    fn append(&mut self, payload: D) -> Result<&Block<D>, ChainError>;

    /// Resolve a fork against `alternate` by cumulative difficulty.
    fn merge<L: BlockLoader<D>>(
        &mut self,
        alternate: &L,
        chunk_size: usize,
    ) -> Result<MergeOutcome, ChainError>;

    /// Validate the stored chain down to genesis; returns the block count.
    fn verify(&self, chunk_size: usize) -> Result<usize, ChainError>;
}
