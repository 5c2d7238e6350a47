//! # Identity Proof
//!
//! Plain SHA-256 of the merged content, with a flat weight of one per
//! block. Fork choice under this scheme degenerates to longest chain.

use crate::domain::{sha256_hex, Block, ChainError, Payload};
use crate::ports::outbound::ProofEngine;

const HEX_DIGEST_LEN: usize = 64;

/// Unweighted SHA-256 hashing.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityProof;

impl<D: Payload> ProofEngine<D> for IdentityProof {
    fn hash(&self, block: &Block<D>) -> String {
        sha256_hex(block.merged_content().as_bytes())
    }

    fn validate(&self, block: &Block<D>) -> bool {
        block.hash == sha256_hex(block.merged_content().as_bytes())
    }

    fn difficulty(&self, hash: &str) -> Result<i64, ChainError> {
        let well_formed = hash.len() == HEX_DIGEST_LEN
            && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(ChainError::MalformedHash {
                hash: hash.to_string(),
                reason: "expected 64 lowercase hex characters",
            });
        }
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::SteppingClock;
    use crate::test_utils::start_time;

    #[test]
    fn test_hash_validates() {
        let clock = SteppingClock::hourly(start_time());
        let mut block = Block::genesis("g".to_string(), &IdentityProof, &clock);
        assert!(ProofEngine::<String>::validate(&IdentityProof, &block));

        block.prev_hash = "x".to_string();
        assert!(!ProofEngine::<String>::validate(&IdentityProof, &block));
    }

    #[test]
    fn test_difficulty_is_flat() {
        let difficulty = |hash: &str| ProofEngine::<String>::difficulty(&IdentityProof, hash);
        assert_eq!(difficulty(&"a".repeat(64)).unwrap(), 1);
        assert!(difficulty("abc").is_err());
        assert!(difficulty(&"g".repeat(64)).is_err());
    }
}
