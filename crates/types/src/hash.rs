use core::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const LENGTH: usize = 32;

    /// The all-zero hash, used by genesis headers and the zero commit.
    pub const ZERO: Hash = Hash([0; 32]);

    pub const fn new(value: [u8; Self::LENGTH]) -> Self {
        Self(value)
    }

    /// Hashes `data` with SHA-256.
    pub fn sha256(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    pub fn into_inner(self) -> [u8; Self::LENGTH] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; Self::LENGTH]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl From<[u8; Hash::LENGTH]> for Hash {
    fn from(value: [u8; Hash::LENGTH]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = usize;

    /// Fails with the offending length if `value` is not exactly 32 bytes.
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; Self::LENGTH] = value.try_into().map_err(|_| value.len())?;
        Ok(Self(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        // SHA-256("abc")
        let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert_eq!(Hash::sha256(b"abc").to_string(), expected);
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash::ZERO.is_zero());
        assert!(!Hash::sha256(b"").is_zero());
    }

    #[test]
    fn try_from_rejects_wrong_length() {
        assert_eq!(Hash::try_from(&[0u8; 31][..]), Err(31));
        assert!(Hash::try_from(&[0u8; 32][..]).is_ok());
    }
}
