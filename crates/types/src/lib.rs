#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]
#![allow(missing_docs)]

pub mod block;
pub mod codec;
pub mod commit;
pub mod data;
pub mod error;
pub mod genesis;
pub mod hash;
pub mod header;
pub mod proto;
pub mod signing;
pub mod state;
pub mod validator_set;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use block::{Block, SignedHeader};
pub use commit::Commit;
pub use data::{Data, Tx};
pub use error::ValidationError;
pub use hash::Hash;
pub use header::{Header, Version};
pub use state::{ConsensusParams, State};
pub use validator_set::{Validator, ValidatorSet};

/// Opaque namespace identifier handed to the executor during block
/// construction and forwarded to the DA layer untouched.
pub type NamespaceId = [u8; 8];
