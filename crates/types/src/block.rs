use crate::{
    commit::Commit, data::Data, error::ValidationError, hash::Hash, header::Header,
    validator_set::ValidatorSet,
};

/// Header plus the evidence chain it rides on.
///
/// `last_commit` attests the *previous* block; the commit for this header
/// travels in the next block (and in the store under this height once that
/// successor has been seen).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedHeader {
    pub header: Header,
    pub last_commit: Commit,
    pub validators: ValidatorSet,
}

impl SignedHeader {
    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        self.header.validate_basic()?;
        self.last_commit.validate_basic()?;
        self.validators.validate_basic()?;

        if self.last_commit.height + 1 != self.header.height {
            return Err(ValidationError::CommitHeightMismatch {
                commit: self.last_commit.height,
                header: self.header.height,
            });
        }
        let commit_hash = self.last_commit.hash();
        if self.header.last_commit_hash != commit_hash {
            return Err(ValidationError::LastCommitHashMismatch {
                in_header: self.header.last_commit_hash,
                computed: commit_hash,
            });
        }
        Ok(())
    }
}

/// A full block: signed header and payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub signed_header: SignedHeader,
    pub data: Data,
}

impl Block {
    pub fn header(&self) -> &Header {
        &self.signed_header.header
    }

    pub fn height(&self) -> u64 {
        self.signed_header.header.height
    }

    pub fn hash(&self) -> Hash {
        self.signed_header.header.hash()
    }

    pub fn last_commit(&self) -> &Commit {
        &self.signed_header.last_commit
    }

    /// Structural validation, including the recomputed payload hash.
    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        self.signed_header.validate_basic()?;
        self.data.validate_basic()?;

        let data_hash = self.data.hash();
        if self.signed_header.header.data_hash != data_hash {
            return Err(ValidationError::DataHashMismatch {
                in_header: self.signed_header.header.data_hash,
                computed: data_hash,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::test_utils::random_block;

    #[test]
    fn valid_block_passes_basic_validation() {
        random_block(4, 3).validate_basic().unwrap();
        random_block(1, 0).validate_basic().unwrap();
    }

    #[test]
    fn tampered_payload_is_rejected() {
        // Parallel sequences, so the recomputed payload hash is what trips.
        let mut block = random_block(4, 2);
        block.data.txs.push(Bytes::from_static(b"smuggled"));
        block.data.intermediate_state_roots.push(Hash::ZERO);
        assert!(matches!(
            block.validate_basic(),
            Err(ValidationError::DataHashMismatch { .. })
        ));
    }

    #[test]
    fn uneven_payload_is_rejected() {
        let mut block = random_block(4, 2);
        block.data.txs.push(Bytes::from_static(b"smuggled"));
        assert!(matches!(
            block.validate_basic(),
            Err(ValidationError::UnevenIntermediateStateRoots { txs: 3, roots: 2 })
        ));
    }

    #[test]
    fn tampered_commit_linkage_is_rejected() {
        let mut block = random_block(4, 1);
        block.signed_header.last_commit.height = 7;
        assert!(matches!(
            block.validate_basic(),
            Err(ValidationError::CommitHeightMismatch { .. })
        ));
    }
}
