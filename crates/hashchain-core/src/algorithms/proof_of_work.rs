//! # Proof of Work
//!
//! Hashcash-style nonce search over SHA-256.
//!
//! ## Encoding
//!
//! ```text
//! <target_bits>:<nonce>:<hex digest>
//! digest = sha256(merged_content + nonce + target_bits)   (decimal text)
//! ```
//!
//! A digest, read as a big-endian 256-bit integer, is accepted when it is
//! strictly below `2^target_bits`, i.e. its leading `256 - target_bits`
//! bits are zero. Lower targets are harder, so the fork-choice weight of a
//! hash is the expected work `2^(256 - target_bits)`.

use sha2::{Digest, Sha256};

use crate::domain::{Block, ChainError, Payload};
use crate::ports::outbound::ProofEngine;

/// Digest width in bits.
pub const DIGEST_BITS: u32 = 256;

/// Widest work exponent whose weight still fits in an `i64`.
const MAX_WORK_BITS: u32 = 62;

/// Lowest accepted target. Harder targets could not be weighed.
pub const MIN_TARGET_BITS: u32 = DIGEST_BITS - MAX_WORK_BITS;

/// SHA-256 proof of work with a fixed target.
#[derive(Clone, Debug)]
pub struct WorkProof {
    target_bits: u32,
}

struct ParsedHash<'a> {
    target_bits: u32,
    nonce: u64,
    digest: &'a str,
}

impl WorkProof {
    /// Create an engine producing digests below `2^target_bits`.
    ///
    /// `target_bits` must lie in `MIN_TARGET_BITS..=DIGEST_BITS`.
    pub fn new(target_bits: u32) -> Result<Self, ChainError> {
        if target_bits > DIGEST_BITS {
            return Err(ChainError::InvalidConfig(format!(
                "target bits {target_bits} exceed digest width {DIGEST_BITS}"
            )));
        }
        if target_bits < MIN_TARGET_BITS {
            return Err(ChainError::InvalidConfig(format!(
                "target bits {target_bits} below minimum {MIN_TARGET_BITS}"
            )));
        }
        Ok(Self { target_bits })
    }

    /// Configured target exponent.
    pub fn target_bits(&self) -> u32 {
        self.target_bits
    }

    fn digest(merged: &str, nonce: u64, target_bits: u32) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(merged.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(target_bits.to_string().as_bytes());
        hasher.finalize().into()
    }

    fn encode(target_bits: u32, nonce: u64, digest: &[u8; 32]) -> String {
        format!("{}:{}:{}", target_bits, nonce, hex::encode(digest))
    }
}

fn leading_zero_bits(digest: &[u8; 32]) -> u32 {
    let mut bits = 0;
    for byte in digest {
        if *byte != 0 {
            return bits + byte.leading_zeros();
        }
        bits += 8;
    }
    bits
}

fn meets_target(digest: &[u8; 32], target_bits: u32) -> bool {
    leading_zero_bits(digest) >= DIGEST_BITS - target_bits
}

fn parse_target(hash: &str, field: &str) -> Result<u32, ChainError> {
    let target_bits: u32 = field.parse().map_err(|_| ChainError::MalformedHash {
        hash: hash.to_string(),
        reason: "target is not a number",
    })?;
    if target_bits > DIGEST_BITS {
        return Err(ChainError::MalformedHash {
            hash: hash.to_string(),
            reason: "target exceeds digest width",
        });
    }
    Ok(target_bits)
}

fn parse_hash(hash: &str) -> Result<ParsedHash<'_>, ChainError> {
    let mut fields = hash.split(':');
    let (Some(target), Some(nonce), Some(digest), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(ChainError::MalformedHash {
            hash: hash.to_string(),
            reason: "expected three colon-separated fields",
        });
    };

    let target_bits = parse_target(hash, target)?;
    let nonce = nonce.parse().map_err(|_| ChainError::MalformedHash {
        hash: hash.to_string(),
        reason: "nonce is not a number",
    })?;

    Ok(ParsedHash {
        target_bits,
        nonce,
        digest,
    })
}

impl<D: Payload> ProofEngine<D> for WorkProof {
    fn hash(&self, block: &Block<D>) -> String {
        let merged = block.merged_content();
        let mut nonce = 0u64;
        loop {
            let digest = Self::digest(&merged, nonce, self.target_bits);
            if meets_target(&digest, self.target_bits) {
                return Self::encode(self.target_bits, nonce, &digest);
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    fn validate(&self, block: &Block<D>) -> bool {
        let Ok(parsed) = parse_hash(&block.hash) else {
            return false;
        };

        let digest = Self::digest(&block.merged_content(), parsed.nonce, parsed.target_bits);
        // Re-encoding rejects non-canonical fields such as "+7" or "007".
        meets_target(&digest, parsed.target_bits)
            && hex::encode(digest) == parsed.digest
            && Self::encode(parsed.target_bits, parsed.nonce, &digest) == block.hash
    }

    fn difficulty(&self, hash: &str) -> Result<i64, ChainError> {
        let field = hash.split(':').next().unwrap_or_default();
        let target_bits = parse_target(hash, field)?;
        let work_bits = DIGEST_BITS - target_bits;
        if work_bits > MAX_WORK_BITS {
            return Err(ChainError::DifficultyOverflow);
        }
        Ok(1i64 << work_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::SteppingClock;
    use crate::test_utils::start_time;

    fn mined(target_bits: u32) -> (WorkProof, Block<String>) {
        let engine = WorkProof::new(target_bits).unwrap();
        let clock = SteppingClock::hourly(start_time());
        let block = Block::genesis("payload".to_string(), &engine, &clock);
        (engine, block)
    }

    #[test]
    fn test_rejects_target_above_width() {
        assert!(WorkProof::new(257).is_err());
        assert!(WorkProof::new(256).is_ok());
    }

    #[test]
    fn test_rejects_target_below_minimum() {
        for target_bits in [0, 1, MIN_TARGET_BITS - 1] {
            assert!(matches!(
                WorkProof::new(target_bits),
                Err(ChainError::InvalidConfig(_))
            ));
        }

        let engine = WorkProof::new(MIN_TARGET_BITS).unwrap();
        let hash = format!("{MIN_TARGET_BITS}:0:00");
        assert_eq!(
            ProofEngine::<String>::difficulty(&engine, &hash).unwrap(),
            1i64 << 62
        );
    }

    #[test]
    fn test_leading_zero_bits() {
        let mut digest = [0u8; 32];
        assert_eq!(leading_zero_bits(&digest), 256);
        digest[1] = 0b0001_0000;
        assert_eq!(leading_zero_bits(&digest), 11);
    }

    #[test]
    fn test_hash_meets_target_and_validates() {
        let (engine, block) = mined(244);
        let parsed = parse_hash(&block.hash).unwrap();
        assert_eq!(parsed.target_bits, 244);
        assert!(parsed.digest.starts_with("000"));
        assert!(ProofEngine::<String>::validate(&engine, &block));
    }

    #[test]
    fn test_validate_uses_target_from_hash() {
        let (_, block) = mined(250);
        let other = WorkProof::new(240).unwrap();
        assert!(ProofEngine::<String>::validate(&other, &block));
    }

    #[test]
    fn test_every_bit_flip_is_rejected() {
        let (engine, block) = mined(248);
        let bytes = block.hash.as_bytes().to_vec();
        for position in 0..bytes.len() {
            for bit in 0..8 {
                let mut flipped = bytes.clone();
                flipped[position] ^= 1 << bit;
                let Ok(hash) = String::from_utf8(flipped) else {
                    continue;
                };
                let mut tampered = block.clone();
                tampered.hash = hash;
                assert!(
                    !ProofEngine::<String>::validate(&engine, &tampered),
                    "flip at byte {position} bit {bit} accepted"
                );
            }
        }
    }

    #[test]
    fn test_malformed_hashes_validate_false() {
        let (engine, block) = mined(252);
        for hash in ["", "abc", "252:1", "x:1:00", "252:1:00:extra", "300:1:00"] {
            let mut bad = block.clone();
            bad.hash = hash.to_string();
            assert!(!ProofEngine::<String>::validate(&engine, &bad), "{hash}");
        }
    }

    #[test]
    fn test_difficulty() {
        let engine = WorkProof::new(248).unwrap();
        let difficulty = |hash: &str| ProofEngine::<String>::difficulty(&engine, hash);

        assert_eq!(difficulty("248:1:00ab").unwrap(), 256);
        assert_eq!(difficulty("255:0:00").unwrap(), 2);
        assert_eq!(difficulty("256:0:ff").unwrap(), 1);
        assert!(matches!(difficulty("nope:0:00"), Err(ChainError::MalformedHash { .. })));
        assert!(matches!(difficulty("100:0:00"), Err(ChainError::DifficultyOverflow)));
    }

    #[test]
    fn test_content_change_invalidates() {
        let (engine, mut block) = mined(252);
        block.data = "other".to_string();
        assert!(!ProofEngine::<String>::validate(&engine, &block));
    }
}
