//! Deterministic and randomized constructors shared by tests across the
//! workspace. Not part of the public API surface proper; enable with the
//! `test-utils` feature.

use bytes::Bytes;
use rand::RngCore;

use crate::{
    block::{Block, SignedHeader},
    commit::Commit,
    data::{Data, Tx},
    genesis::Genesis,
    hash::Hash,
    header::{Header, Version},
    signing::Ed25519Provider,
    state::ConsensusParams,
    validator_set::{Validator, ValidatorSet},
};

pub const TEST_CHAIN_ID: &str = "test";

/// Fixed timestamp base so chained headers get non-decreasing times.
const TEST_TIME_BASE: u64 = 1_700_000_000_000_000_000;

/// Deterministic keypair derived from a one-byte seed.
pub fn test_keypair(seed: u8) -> Ed25519Provider {
    Ed25519Provider::from_seed([seed; 32])
}

/// Single-member validator set for the given keypair.
pub fn test_validator_set(provider: &Ed25519Provider) -> ValidatorSet {
    ValidatorSet::single(Validator::new(provider.public_key(), 1))
}

/// Genesis document with a single deterministic proposer.
pub fn test_genesis(chain_id: &str, initial_height: u64) -> (Genesis, Ed25519Provider) {
    let provider = test_keypair(1);
    let genesis = Genesis {
        chain_id: chain_id.to_string(),
        initial_height,
        genesis_time: TEST_TIME_BASE,
        validator_set: test_validator_set(&provider),
        consensus_params: ConsensusParams::default(),
    };
    (genesis, provider)
}

pub fn random_bytes(n: usize) -> Bytes {
    let mut data = vec![0; n];
    rand::thread_rng().fill_bytes(&mut data);
    Bytes::from(data)
}

pub fn random_hash() -> Hash {
    let mut data = [0; Hash::LENGTH];
    rand::thread_rng().fill_bytes(&mut data);
    Hash::new(data)
}

/// Transaction of random contents between 100 and 200 bytes.
pub fn random_tx() -> Tx {
    let size = 100 + (rand::random::<usize>() % 100);
    random_bytes(size)
}

/// Header with random linkage digests and the test chain id.
pub fn random_header() -> Header {
    Header {
        height: rand::random::<u32>() as u64,
        time: TEST_TIME_BASE,
        chain_id: TEST_CHAIN_ID.to_string(),
        version: Version::default(),
        last_header_hash: random_hash(),
        last_commit_hash: random_hash(),
        data_hash: random_hash(),
        consensus_hash: random_hash(),
        app_hash: random_hash(),
        last_results_hash: random_hash(),
        proposer_address: random_bytes(32),
        aggregators_hash: random_hash(),
        next_aggregators_hash: random_hash(),
    }
}

/// Random header correctly chained after `header`.
pub fn random_next_header(header: &Header) -> Header {
    let mut next = random_header();
    next.height = header.height + 1;
    next.time = header.time + 1_000_000_000;
    next.last_header_hash = header.hash();
    next.proposer_address = header.proposer_address.clone();
    next.aggregators_hash = header.next_aggregators_hash;
    next
}

/// Block with random payload whose internal linkage (payload hash, embedded
/// commit) is self-consistent, so it passes `validate_basic`.
pub fn random_block(height: u64, n_txs: usize) -> Block {
    let provider = test_keypair(9);
    let data = Data {
        txs: (0..n_txs).map(|_| random_tx()).collect(),
        intermediate_state_roots: (0..n_txs).map(|_| random_hash()).collect(),
    };

    let last_commit = if height <= 1 {
        Commit::zero(height.saturating_sub(1))
    } else {
        Commit {
            height: height - 1,
            header_hash: random_hash(),
            signatures: vec![provider.sign(b"previous header")],
        }
    };

    let mut header = random_header();
    header.height = height;
    header.data_hash = data.hash();
    header.last_commit_hash = last_commit.hash();

    Block {
        signed_header: SignedHeader {
            header,
            last_commit,
            validators: test_validator_set(&provider),
        },
        data,
    }
}

/// Fully signed chain of `count` blocks starting at the genesis initial
/// height: every block's `last_commit` authenticates its predecessor, and
/// the aggregator-set linkage holds across adjacent headers.
pub fn build_chain(genesis: &Genesis, provider: &Ed25519Provider, count: usize) -> Vec<Block> {
    let validators = genesis.validator_set.clone();
    let set_hash = validators.hash();
    let consensus_hash = genesis.consensus_params.hash();

    let mut blocks = Vec::with_capacity(count);
    let mut prev_header: Option<Header> = None;
    let mut prev_commit = Commit::zero(genesis.initial_height.saturating_sub(1));

    for offset in 0..count as u64 {
        let height = genesis.initial_height + offset;
        let data = Data { txs: vec![random_tx()], intermediate_state_roots: vec![random_hash()] };

        let header = Header {
            height,
            time: genesis.genesis_time + offset * 1_000_000_000,
            chain_id: genesis.chain_id.clone(),
            version: Version::default(),
            last_header_hash: prev_header.as_ref().map(Header::hash).unwrap_or_default(),
            last_commit_hash: prev_commit.hash(),
            data_hash: data.hash(),
            consensus_hash,
            app_hash: Hash::ZERO,
            last_results_hash: Hash::ZERO,
            proposer_address: provider.address(),
            aggregators_hash: set_hash,
            next_aggregators_hash: set_hash,
        };

        let commit = Commit {
            height,
            header_hash: header.hash(),
            signatures: vec![provider.sign(&header.encode_canonical())],
        };

        blocks.push(Block {
            signed_header: SignedHeader {
                header: header.clone(),
                last_commit: prev_commit,
                validators: validators.clone(),
            },
            data,
        });

        prev_header = Some(header);
        prev_commit = commit;
    }

    blocks
}
