use bytes::{BufMut, BytesMut};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, hash::Hash};

/// A single block aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub public_key: VerifyingKey,
    pub voting_power: u64,
}

impl Validator {
    pub fn new(public_key: VerifyingKey, voting_power: u64) -> Self {
        Self { public_key, voting_power }
    }

    /// Raw public key bytes; doubles as the proposer address.
    pub fn address(&self) -> &[u8; 32] {
        self.public_key.as_bytes()
    }
}

/// The aggregator set in force for a block.
///
/// The single-proposer chain carries one validator who is also the
/// proposer, but the set hashes and rotates like a multi-member one so the
/// header linkage (`aggregators_hash` / `next_aggregators_hash`) does not
/// change shape when membership does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub proposer: Validator,
    pub validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new(proposer: Validator, validators: Vec<Validator>) -> Self {
        Self { proposer, validators }
    }

    /// Set with a single member who proposes every block.
    pub fn single(proposer: Validator) -> Self {
        Self { validators: vec![proposer.clone()], proposer }
    }

    /// Deterministic set digest used for `aggregators_hash`.
    pub fn hash(&self) -> Hash {
        let mut buf = BytesMut::with_capacity((self.validators.len() + 1) * 40);
        buf.put_slice(self.proposer.address());
        buf.put_u64_le(self.proposer.voting_power);
        for validator in &self.validators {
            buf.put_slice(validator.address());
            buf.put_u64_le(validator.voting_power);
        }
        Hash::sha256(&buf)
    }

    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        if self.validators.is_empty() {
            return Err(ValidationError::EmptyValidatorSet);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_keypair;

    #[test]
    fn hash_depends_on_membership() {
        let a = ValidatorSet::single(Validator::new(test_keypair(1).public_key(), 1));
        let b = ValidatorSet::single(Validator::new(test_keypair(2).public_key(), 1));
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.hash());
    }

    #[test]
    fn empty_set_is_invalid() {
        let proposer = Validator::new(test_keypair(1).public_key(), 1);
        let set = ValidatorSet::new(proposer, Vec::new());
        assert_eq!(set.validate_basic(), Err(ValidationError::EmptyValidatorSet));
    }
}
