//! # Chain Configuration
//!
//! Proof scheme selection and pipeline sizing.

use serde::{Deserialize, Serialize};
use std::env;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::algorithms::{IdentityProof, WorkProof};
use crate::domain::{ChainError, Payload};
use crate::ports::outbound::ProofEngine;

/// Default page size for merge, sync and verification.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Default number of cached pages.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default proof-of-work target exponent.
pub const DEFAULT_TARGET_BITS: u32 = 240;

/// Proof scheme selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum ProofConfig {
    /// SHA-256 proof of work.
    Work {
        /// Digest must be below `2^target_bits`.
        target_bits: u32,
    },
    /// Plain SHA-256, every block weighs 1.
    Identity,
}

impl Default for ProofConfig {
    fn default() -> Self {
        ProofConfig::Work {
            target_bits: DEFAULT_TARGET_BITS,
        }
    }
}

impl ProofConfig {
    /// Instantiate the configured engine.
    pub fn build<D: Payload>(&self) -> Result<Arc<dyn ProofEngine<D>>, ChainError> {
        let engine: Arc<dyn ProofEngine<D>> = match self {
            ProofConfig::Work { target_bits } => Arc::new(WorkProof::new(*target_bits)?),
            ProofConfig::Identity => Arc::new(IdentityProof),
        };
        Ok(engine)
    }
}

/// Chain configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Proof scheme.
    pub proof: ProofConfig,

    /// Blocks per page for merge, sync and verification.
    pub chunk_size: usize,

    /// Pages kept by the memoizing loader.
    pub cache_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            proof: ProofConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ChainConfig {
    /// Create a config for testing (cheap proofs, small pages).
    pub fn for_testing() -> Self {
        Self {
            proof: ProofConfig::Work { target_bits: 252 },
            chunk_size: 4,
            cache_capacity: 8,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `HASHCHAIN_PROOF`: `work` or `identity` (default: work)
    /// - `HASHCHAIN_TARGET_BITS`: proof-of-work target (default: 240)
    /// - `HASHCHAIN_CHUNK_SIZE`: page size (default: 64)
    /// - `HASHCHAIN_CACHE_CAPACITY`: cached pages (default: 256)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ChainConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let target_bits = lookup("HASHCHAIN_TARGET_BITS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TARGET_BITS);

        let proof = match lookup("HASHCHAIN_PROOF").map(|v| v.to_lowercase()) {
            Some(scheme) if scheme == "identity" => ProofConfig::Identity,
            _ => ProofConfig::Work { target_bits },
        };

        Self {
            proof,
            chunk_size: lookup("HASHCHAIN_CHUNK_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            cache_capacity: lookup("HASHCHAIN_CACHE_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CACHE_CAPACITY),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.chunk_size == 0 {
            return Err(ChainError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ChainError::InvalidConfig(
                "cache_capacity must be positive".into(),
            ));
        }
        if let ProofConfig::Work { target_bits } = self.proof {
            WorkProof::new(target_bits)?;
        }
        Ok(())
    }

    /// Cache capacity as the memoizing loader takes it.
    pub fn cache_pages(&self) -> Result<NonZeroUsize, ChainError> {
        NonZeroUsize::new(self.cache_capacity)
            .ok_or_else(|| ChainError::InvalidConfig("cache_capacity must be positive".into()))
    }
}
