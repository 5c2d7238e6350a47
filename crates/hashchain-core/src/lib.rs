//! # Hashchain Core
//!
//! Append-only, hash-linked ledger with pluggable proofs, pluggable
//! storage and a cursor-based sync pipeline.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Build and validate blocks whose hash covers timestamp, payload digest
//!   and predecessor hash
//! - Page block sources through validating, memoizing loaders
//! - Resolve forks by cumulative proof difficulty
//!
//! ## Fork Choice
//!
//! | Local vs alternate prefix | Result |
//! |---------------------------|--------|
//! | heavier | local chain kept |
//! | equal | `EqualDifficulties` error, storage untouched |
//! | lighter | local prefix deleted, alternate prefix stored |
//!
//! ## Module Structure
//!
//! ```text
//! hashchain-core/
//! ├── domain/          # Block, validation, LRU cache, errors
//! ├── algorithms/      # Proof of work, identity proof, divergence search
//! ├── ports/           # ChainApi (inbound) + ProofEngine/BlockStorage/BlockLoader/Clock (outbound)
//! ├── adapters/        # Loader decorators, in-memory storage, clocks
//! ├── application/     # ChainService, storage sync driver
//! └── config.rs        # ChainConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[doc(hidden)]
pub mod test_utils;

// Re-exports
pub use adapters::{
    ChunkValidatingLoader, LastBlockValidatingLoader, MemoizingLoader, MemoryStorage,
    SteppingClock, SystemClock,
};
pub use algorithms::{find_divergence, Divergence, IdentityProof, WorkProof};
pub use application::{load_storage, ChainService};
pub use config::{ChainConfig, ProofConfig};
pub use domain::{
    find_common_block, genesis_block_is_valid, group_is_valid, single_block_is_valid,
    total_difficulty, Block, BlockGroup, CacheStats, ChainError, ChunkBoundary, LruCache,
    MergeOutcome, MergeStage, Payload, StorageError, SyncReport, ValidationMode,
};
pub use ports::{BlockLoader, BlockStorage, ChainApi, Clock, Cursor, ProofEngine};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
