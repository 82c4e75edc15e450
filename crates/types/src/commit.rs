use bytes::{BufMut, BytesMut};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::{error::ValidationError, hash::Hash, header::Header};

/// Evidence that a block was produced: one or more signatures over the
/// canonical encoding of the header it names.
///
/// The single-proposer chain requires exactly one signature, by the key
/// whose raw public bytes appear as the header's proposer address. The only
/// commit allowed an empty signature list is the zero commit embedded in
/// the first block of the chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Commit {
    pub height: u64,
    pub header_hash: Hash,
    pub signatures: Vec<Signature>,
}

impl Commit {
    /// The synthetic commit preceding the first block.
    pub fn zero(height: u64) -> Self {
        Self { height, header_hash: Hash::ZERO, signatures: Vec::new() }
    }

    pub fn is_zero(&self) -> bool {
        self.header_hash.is_zero() && self.signatures.is_empty()
    }

    /// Deterministic commit hash referenced by `Header::last_commit_hash`.
    pub fn hash(&self) -> Hash {
        let mut buf = BytesMut::with_capacity(8 + 32 + 4 + self.signatures.len() * 64);
        buf.put_u64_le(self.height);
        buf.put_slice(self.header_hash.as_ref());
        buf.put_u32_le(self.signatures.len() as u32);
        for signature in &self.signatures {
            buf.put_slice(&signature.to_bytes());
        }
        Hash::sha256(&buf)
    }

    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        if self.is_zero() {
            return Ok(());
        }
        match self.signatures.len() {
            0 => Err(ValidationError::NoSignatures),
            1 => Ok(()),
            n => Err(ValidationError::TooManySignatures(n)),
        }
    }

    /// Verifies this commit against the header it claims to attest.
    ///
    /// Checks the height and header-hash linkage, then the proposer
    /// signature over the header's canonical encoding.
    pub fn verify(&self, header: &Header) -> Result<(), ValidationError> {
        self.validate_basic()?;

        if self.height != header.height {
            return Err(ValidationError::CommitHeightMismatch {
                commit: self.height,
                header: header.height,
            });
        }
        let header_hash = header.hash();
        if self.header_hash != header_hash {
            return Err(ValidationError::CommitHashMismatch {
                commit: self.header_hash,
                header: header_hash,
            });
        }

        let key_bytes: [u8; 32] = header
            .proposer_address
            .as_ref()
            .try_into()
            .map_err(|_| ValidationError::InvalidProposerAddress)?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| ValidationError::InvalidProposerAddress)?;

        let signature =
            self.signatures.first().ok_or(ValidationError::NoSignatures)?;
        key.verify(&header.encode_canonical(), signature)
            .map_err(|_| ValidationError::InvalidSignature(header_hash))
    }
}
