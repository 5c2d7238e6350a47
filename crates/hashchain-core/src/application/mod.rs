//! # Application Module
//!
//! The chain orchestrator and the storage sync driver.

pub mod service;
pub mod sync;

pub use service::ChainService;
pub use sync::load_storage;
