use bytes::{BufMut, BytesMut};

use crate::{genesis::Genesis, hash::Hash, header::Version, validator_set::ValidatorSet};

/// Consensus parameters committed to by `Header::consensus_hash`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConsensusParams {
    /// Upper bound on the serialized size of a block's payload.
    pub max_block_bytes: u64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self { max_block_bytes: 1024 * 1024 }
    }
}

impl ConsensusParams {
    pub fn hash(&self) -> Hash {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u64_le(self.max_block_bytes);
        Hash::sha256(&buf)
    }
}

/// The chain's applied-state snapshot.
///
/// Mutated only by the executor, always forward in height, and persisted
/// atomically with the block that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State {
    pub version: Version,
    pub chain_id: String,
    pub initial_height: u64,

    pub last_block_height: u64,
    pub last_block_hash: Hash,
    /// Unix nanoseconds of the last applied block.
    pub last_block_time: u64,

    pub validators: ValidatorSet,
    pub next_validators: ValidatorSet,
    pub consensus_params: ConsensusParams,

    pub last_results_hash: Hash,
    pub app_hash: Hash,
}

impl State {
    /// Bootstrap state for a fresh chain.
    pub fn from_genesis(genesis: &Genesis) -> Self {
        Self {
            version: Version::default(),
            chain_id: genesis.chain_id.clone(),
            initial_height: genesis.initial_height,
            last_block_height: genesis.initial_height.saturating_sub(1),
            last_block_hash: Hash::ZERO,
            last_block_time: genesis.genesis_time,
            validators: genesis.validator_set.clone(),
            next_validators: genesis.validator_set.clone(),
            consensus_params: genesis.consensus_params,
            last_results_hash: Hash::ZERO,
            app_hash: Hash::ZERO,
        }
    }
}
