use bytes::Bytes;
use ed25519_dalek::Signer;
pub use ed25519_dalek::{Signature, SigningKey, VerifyingKey};

/// Signing provider wrapping the proposer's ed25519 key.
///
/// The proposer address on the wire is the raw 32-byte public key, so
/// commit verification needs nothing beyond the header itself.
#[derive(Debug)]
pub struct Ed25519Provider {
    signing_key: SigningKey,
}

impl Ed25519Provider {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Derives the key deterministically from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { signing_key: SigningKey::from_bytes(&seed) }
    }

    pub fn sign(&self, data: &[u8]) -> Signature {
        self.signing_key.sign(data)
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Raw public key bytes, used as the proposer address.
    pub fn address(&self) -> Bytes {
        Bytes::copy_from_slice(self.public_key().as_bytes())
    }
}
