//! # Domain Module
//!
//! Core domain types: blocks, validation, the page cache, errors.

pub mod block;
pub mod cache;
pub mod errors;
pub mod validation;
pub mod value_objects;

pub use block::*;
pub use cache::*;
pub use errors::*;
pub use validation::*;
pub use value_objects::*;
