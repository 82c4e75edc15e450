use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{codec::CodecError, error::ValidationError, hash::Hash};

/// Block and application format versions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Version {
    pub block: u64,
    pub app: u64,
}

/// The immutable descriptor of a block.
///
/// Headers chain through `last_header_hash` and `last_commit_hash`; the
/// aggregator set of a header must equal the `next_aggregators_hash`
/// announced by its predecessor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// Block height, strictly monotone across the chain.
    pub height: u64,
    /// Unix nanoseconds, non-decreasing across the chain.
    pub time: u64,
    pub chain_id: String,
    pub version: Version,

    /// Hash of the previous header.
    pub last_header_hash: Hash,
    /// Hash of the commit embedded alongside this header.
    pub last_commit_hash: Hash,
    /// Hash of the block payload.
    pub data_hash: Hash,
    /// Hash of the consensus parameters in force for this block.
    pub consensus_hash: Hash,
    /// Application state hash after the previous block.
    pub app_hash: Hash,
    /// Root of the transaction results of the previous block.
    pub last_results_hash: Hash,

    /// Raw public key bytes of the block proposer.
    pub proposer_address: Bytes,

    /// Hash of the aggregator set at block creation time.
    pub aggregators_hash: Hash,
    /// Hash of the aggregator set for the next block.
    pub next_aggregators_hash: Hash,
}

impl Header {
    /// Canonical binary encoding: the signing preimage and hashing input.
    ///
    /// Layout, all integers little-endian:
    /// `height (u64)` ‖ `time (u64)` ‖ `chain_id (u16 length ‖ bytes)` ‖
    /// `version.block (u64)` ‖ `version.app (u64)` ‖ `last_header_hash` ‖
    /// `last_commit_hash` ‖ `data_hash` ‖ `consensus_hash` ‖ `app_hash` ‖
    /// `last_results_hash` ‖ `proposer_address (u16 length ‖ bytes)` ‖
    /// `aggregators_hash` ‖ `next_aggregators_hash`.
    pub fn encode_canonical(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            8 + 8 + 2 + self.chain_id.len() + 8 + 8 + 6 * 32 + 2 + self.proposer_address.len() + 64,
        );
        buf.put_u64_le(self.height);
        buf.put_u64_le(self.time);
        buf.put_u16_le(self.chain_id.len() as u16);
        buf.put_slice(self.chain_id.as_bytes());
        buf.put_u64_le(self.version.block);
        buf.put_u64_le(self.version.app);
        buf.put_slice(self.last_header_hash.as_ref());
        buf.put_slice(self.last_commit_hash.as_ref());
        buf.put_slice(self.data_hash.as_ref());
        buf.put_slice(self.consensus_hash.as_ref());
        buf.put_slice(self.app_hash.as_ref());
        buf.put_slice(self.last_results_hash.as_ref());
        buf.put_u16_le(self.proposer_address.len() as u16);
        buf.put_slice(&self.proposer_address);
        buf.put_slice(self.aggregators_hash.as_ref());
        buf.put_slice(self.next_aggregators_hash.as_ref());
        buf.freeze()
    }

    /// Inverse of [`Header::encode_canonical`].
    ///
    /// Rejects truncated input and trailing bytes.
    pub fn decode_canonical(mut bytes: &[u8]) -> Result<Self, CodecError> {
        fn take_u64(buf: &mut &[u8]) -> Result<u64, CodecError> {
            if buf.remaining() < 8 {
                return Err(CodecError::TruncatedHeader);
            }
            Ok(buf.get_u64_le())
        }

        fn take_prefixed(buf: &mut &[u8]) -> Result<Vec<u8>, CodecError> {
            if buf.remaining() < 2 {
                return Err(CodecError::TruncatedHeader);
            }
            let len = buf.get_u16_le() as usize;
            if buf.remaining() < len {
                return Err(CodecError::TruncatedHeader);
            }
            let mut out = vec![0; len];
            buf.copy_to_slice(&mut out);
            Ok(out)
        }

        fn take_hash(buf: &mut &[u8]) -> Result<Hash, CodecError> {
            if buf.remaining() < Hash::LENGTH {
                return Err(CodecError::TruncatedHeader);
            }
            let mut out = [0; Hash::LENGTH];
            buf.copy_to_slice(&mut out);
            Ok(Hash::new(out))
        }

        let buf = &mut bytes;
        let height = take_u64(buf)?;
        let time = take_u64(buf)?;
        let chain_id = String::from_utf8(take_prefixed(buf)?)
            .map_err(|_| CodecError::InvalidChainId)?;
        let version = Version { block: take_u64(buf)?, app: take_u64(buf)? };
        let last_header_hash = take_hash(buf)?;
        let last_commit_hash = take_hash(buf)?;
        let data_hash = take_hash(buf)?;
        let consensus_hash = take_hash(buf)?;
        let app_hash = take_hash(buf)?;
        let last_results_hash = take_hash(buf)?;
        let proposer_address = Bytes::from(take_prefixed(buf)?);
        let aggregators_hash = take_hash(buf)?;
        let next_aggregators_hash = take_hash(buf)?;

        if !buf.is_empty() {
            return Err(CodecError::TrailingBytes { remaining: buf.len() });
        }

        Ok(Self {
            height,
            time,
            chain_id,
            version,
            last_header_hash,
            last_commit_hash,
            data_hash,
            consensus_hash,
            app_hash,
            last_results_hash,
            proposer_address,
            aggregators_hash,
            next_aggregators_hash,
        })
    }

    /// SHA-256 of the canonical encoding.
    pub fn hash(&self) -> Hash {
        Hash::sha256(&self.encode_canonical())
    }

    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        if self.proposer_address.is_empty() {
            return Err(ValidationError::NoProposerAddress);
        }
        Ok(())
    }

    /// Verifies `next` as the direct successor of this header.
    ///
    /// Only adjacent verification is supported; there is no commit-skipping
    /// path for non-adjacent headers.
    pub fn verify(&self, next: &Header) -> Result<(), ValidationError> {
        if next.height != self.height + 1 {
            return Err(ValidationError::NonAdjacentHeight {
                expected: self.height + 1,
                got: next.height,
            });
        }
        if next.aggregators_hash != self.next_aggregators_hash {
            return Err(ValidationError::AggregatorsHashMismatch {
                expected: self.next_aggregators_hash,
                got: next.aggregators_hash,
            });
        }
        if next.last_header_hash != self.hash() {
            return Err(ValidationError::LastHeaderHashMismatch {
                expected: self.hash(),
                got: next.last_header_hash,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{random_header, random_next_header};

    #[test]
    fn canonical_encoding_round_trips() {
        let header = random_header();
        let encoded = header.encode_canonical();
        let decoded = Header::decode_canonical(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn canonical_decoding_rejects_truncation_and_trailing_bytes() {
        let header = random_header();
        let encoded = header.encode_canonical();

        for len in [0, 7, encoded.len() - 1] {
            assert!(matches!(
                Header::decode_canonical(&encoded[..len]),
                Err(CodecError::TruncatedHeader)
            ));
        }

        let mut extended = encoded.to_vec();
        extended.push(0);
        assert!(matches!(
            Header::decode_canonical(&extended),
            Err(CodecError::TrailingBytes { remaining: 1 })
        ));
    }

    #[test]
    fn hash_changes_with_any_field() {
        let header = random_header();
        let mut modified = header.clone();
        modified.height += 1;
        assert_ne!(header.hash(), modified.hash());

        let mut modified = header.clone();
        modified.app_hash = Hash::sha256(b"other");
        assert_ne!(header.hash(), modified.hash());
    }

    #[test]
    fn validate_basic_requires_proposer_address() {
        let mut header = random_header();
        header.proposer_address = Bytes::new();
        assert_eq!(header.validate_basic(), Err(ValidationError::NoProposerAddress));
    }

    #[test]
    fn verify_accepts_adjacent_header() {
        let header = random_header();
        let next = random_next_header(&header);
        header.verify(&next).unwrap();
    }

    #[test]
    fn verify_rejects_aggregator_set_mismatch() {
        let header = random_header();
        let mut next = random_next_header(&header);
        next.aggregators_hash = Hash::sha256(b"rogue set");
        assert!(matches!(
            header.verify(&next),
            Err(ValidationError::AggregatorsHashMismatch { .. })
        ));
    }

    #[test]
    fn verify_rejects_height_gap() {
        let header = random_header();
        let mut next = random_next_header(&header);
        next.height += 1;
        assert!(matches!(header.verify(&next), Err(ValidationError::NonAdjacentHeight { .. })));
    }
}
