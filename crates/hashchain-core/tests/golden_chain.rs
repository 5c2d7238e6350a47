//! # Golden Proof-of-Work Chain
//!
//! A six-block chain mined at target 248 from a fixed hourly clock must
//! reproduce these `(timestamp, hash)` pairs exactly.

use std::sync::Arc;

use hashchain_core::domain::encode_timestamp;
use hashchain_core::test_utils::{build_chain, start_time};
use hashchain_core::{
    group_is_valid, Block, ChainApi, ChainService, MemoryStorage, ProofEngine, SteppingClock,
    ValidationMode, WorkProof,
};

const GOLDEN: [(&str, &str); 6] = [
    (
        "2024-01-01T00:00:00.000000000Z",
        "248:447:006fb19486407913b3ae2136f788aac4a2f91712f675c8d3bef2856db0034018",
    ),
    (
        "2024-01-01T01:00:00.000000000Z",
        "248:223:00f8bb39e673acfad3399a5c93b0fb58805ec7414e536de8c5f3c910f9473390",
    ),
    (
        "2024-01-01T02:00:00.000000000Z",
        "248:836:004af16fb618206275efa4e191a8620703cd67736c2a0e556ba4acbbe99815e7",
    ),
    (
        "2024-01-01T03:00:00.000000000Z",
        "248:162:0067cfccf462c25696585426e5b6462c9c14339fbff6de883c0aca23540c4d38",
    ),
    (
        "2024-01-01T04:00:00.000000000Z",
        "248:71:00d6e9872e6a6bedc0f6839fe6ba2ce40c780de2736fbfa0ebc42b6a6ad6eccc",
    ),
    (
        "2024-01-01T05:00:00.000000000Z",
        "248:102:00ae234b1671fbad280b8dd45bbd206170b0e6f20e007ad1af3e9ae6f10c4958",
    ),
];

const PAYLOADS: [&str; 5] = ["block #0", "block #1", "block #2", "block #3", "block #4"];

fn assert_golden(oldest_first: &[Block<String>]) {
    assert_eq!(oldest_first.len(), GOLDEN.len());
    for (block, (timestamp, hash)) in oldest_first.iter().zip(GOLDEN) {
        assert_eq!(encode_timestamp(&block.timestamp), timestamp);
        assert_eq!(block.hash, hash);
    }
}

#[test]
fn test_golden_chain_from_builder() {
    let engine = WorkProof::new(248).unwrap();
    let clock = SteppingClock::hourly(start_time());

    let mut chain = build_chain(&engine, &clock, "genesis block", &PAYLOADS);
    assert!(group_is_valid(&chain, &[], ValidationMode::AsFullChain, &engine).is_ok());

    chain.reverse();
    assert_golden(&chain);
}

#[test]
fn test_golden_chain_from_service() {
    let engine: Arc<dyn ProofEngine<String>> = Arc::new(WorkProof::new(248).unwrap());
    let clock = Arc::new(SteppingClock::hourly(start_time()));

    let mut service = ChainService::open(
        Some("genesis block".to_string()),
        MemoryStorage::new(),
        engine,
        clock,
    )
    .unwrap();
    for payload in PAYLOADS {
        service.append(payload.to_string()).unwrap();
    }

    assert_eq!(service.tip().hash, GOLDEN[5].1);
    assert_eq!(service.verify(2).unwrap(), 6);
    assert_eq!(service.verify(64).unwrap(), 6);

    let mut stored = service.storage().blocks_newest_first();
    stored.reverse();
    assert_golden(&stored);
}

#[test]
fn test_golden_chain_difficulty() {
    let engine = WorkProof::new(248).unwrap();
    for (_, hash) in GOLDEN {
        assert_eq!(ProofEngine::<String>::difficulty(&engine, hash).unwrap(), 256);
    }
}

#[test]
fn test_golden_chain_wire_round_trip() {
    let engine = WorkProof::new(248).unwrap();
    let clock = SteppingClock::hourly(start_time());
    let chain = build_chain(&engine, &clock, "genesis block", &PAYLOADS);

    let json = serde_json::to_string(&chain).unwrap();
    assert!(json.contains(r#""Hash":"248:447:006fb194"#));

    let decoded: Vec<Block<String>> = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, chain);
    assert!(group_is_valid(&decoded, &[], ValidationMode::AsFullChain, &engine).is_ok());
}
