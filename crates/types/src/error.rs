use thiserror::Error;

use crate::hash::Hash;

/// Structural validation failures for headers, commits and blocks.
///
/// A validation error on a self-produced block indicates a bug in the
/// proposer; on a received block it means the block must be dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no proposer address")]
    NoProposerAddress,

    #[error("proposer address is not a valid ed25519 public key")]
    InvalidProposerAddress,

    #[error("commit has no signatures")]
    NoSignatures,

    #[error("commit carries {0} signatures, expected exactly one")]
    TooManySignatures(usize),

    #[error("commit names height {commit} but header has height {header}")]
    CommitHeightMismatch { commit: u64, header: u64 },

    #[error("commit names header {commit}, header hashes to {header}")]
    CommitHashMismatch { commit: Hash, header: Hash },

    #[error("invalid signature for header {0}")]
    InvalidSignature(Hash),

    #[error("last_commit_hash {in_header} does not match embedded commit hash {computed}")]
    LastCommitHashMismatch { in_header: Hash, computed: Hash },

    #[error("data_hash {in_header} does not match computed data hash {computed}")]
    DataHashMismatch { in_header: Hash, computed: Hash },

    #[error("{txs} transactions but {roots} intermediate state roots")]
    UnevenIntermediateStateRoots { txs: usize, roots: usize },

    #[error(
        "aggregators hash {got} does not match previous header's next aggregators hash {expected}"
    )]
    AggregatorsHashMismatch { expected: Hash, got: Hash },

    #[error("header height {got}, expected {expected} to follow previous header")]
    NonAdjacentHeight { expected: u64, got: u64 },

    #[error("last_header_hash {got} does not match previous header hash {expected}")]
    LastHeaderHashMismatch { expected: Hash, got: Hash },

    #[error("empty validator set")]
    EmptyValidatorSet,
}
