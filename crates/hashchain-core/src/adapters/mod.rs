//! # Adapters
//!
//! Concrete implementations of the outbound ports and the loader pipeline
//! decorators.

pub mod clock;
pub mod loaders;
pub mod memory_storage;

pub use clock::{SteppingClock, SystemClock};
pub use loaders::{ChunkValidatingLoader, LastBlockValidatingLoader, MemoizingLoader};
pub use memory_storage::MemoryStorage;
