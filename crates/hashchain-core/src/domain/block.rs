//! # Blocks
//!
//! The chain record model: an immutable block whose hash covers its
//! timestamp, payload digest and predecessor hash.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Debug;

use crate::ports::outbound::{Clock, ProofEngine};

/// Content carried by a block.
///
/// Equality is used by divergence search and deletion lookup; the digest is
/// the proof engine's view of the content.
pub trait Payload: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Deterministic textual digest of the content.
    fn digest(&self) -> String;
}

impl Payload for String {
    fn digest(&self) -> String {
        sha256_hex(self.as_bytes())
    }
}

/// Hex-encoded SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Canonical timestamp encoding used in hashed content.
///
/// RFC3339, UTC, nanosecond precision, `Z` suffix.
pub fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// A single hash-linked record.
///
/// Serializes as `{Timestamp, Data, Hash, PrevHash}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block<D> {
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Payload.
    pub data: D,
    /// Proof-scheme specific hash.
    pub hash: String,
    /// Hash of the predecessor, empty for genesis.
    pub prev_hash: String,
}

/// Ordered run of blocks, newest first.
pub type BlockGroup<D> = Vec<Block<D>>;

impl<D: Payload> Block<D> {
    /// Build a block on top of `predecessor`.
    pub fn new(
        data: D,
        predecessor: &Block<D>,
        engine: &dyn ProofEngine<D>,
        clock: &dyn Clock,
    ) -> Self {
        Self::sealed(data, predecessor.hash.clone(), engine, clock)
    }

    /// Build the first block of a chain.
    pub fn genesis(data: D, engine: &dyn ProofEngine<D>, clock: &dyn Clock) -> Self {
        Self::sealed(data, String::new(), engine, clock)
    }

    fn sealed(
        data: D,
        prev_hash: String,
        engine: &dyn ProofEngine<D>,
        clock: &dyn Clock,
    ) -> Self {
        let mut block = Block {
            timestamp: clock.now(),
            data,
            hash: String::new(),
            prev_hash,
        };
        block.hash = engine.hash(&block);
        block
    }

    /// Exact input every proof scheme hashes: timestamp, payload digest,
    /// previous hash.
    pub fn merged_content(&self) -> String {
        format!(
            "{}{}{}",
            encode_timestamp(&self.timestamp),
            self.data.digest(),
            self.prev_hash
        )
    }

    /// Whether this block claims to start a chain.
    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }
}
