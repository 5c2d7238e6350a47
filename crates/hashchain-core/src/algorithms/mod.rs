//! # Algorithms
//!
//! Proof schemes and the chunked divergence search.

pub mod divergence;
pub mod identity_proof;
pub mod proof_of_work;

pub use divergence::{find_divergence, Divergence};
pub use identity_proof::IdentityProof;
pub use proof_of_work::WorkProof;
