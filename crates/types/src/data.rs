use bytes::{BufMut, Bytes, BytesMut};

use crate::{error::ValidationError, hash::Hash};

/// An opaque transaction.
pub type Tx = Bytes;

/// Block payload: ordered transactions and the intermediate state roots
/// produced while executing them.
///
/// The two sequences are parallel and always of equal length. Empty
/// sequences serialize as absent fields, not zero-length arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Data {
    pub txs: Vec<Tx>,
    pub intermediate_state_roots: Vec<Hash>,
}

impl Data {
    /// Deterministic payload hash committed to by `Header::data_hash`.
    ///
    /// Length-prefixed concatenation of transactions followed by the state
    /// roots, hashed with SHA-256.
    pub fn hash(&self) -> Hash {
        let mut buf = BytesMut::new();
        buf.put_u32_le(self.txs.len() as u32);
        for tx in &self.txs {
            buf.put_u32_le(tx.len() as u32);
            buf.put_slice(tx);
        }
        buf.put_u32_le(self.intermediate_state_roots.len() as u32);
        for root in &self.intermediate_state_roots {
            buf.put_slice(root.as_ref());
        }
        Hash::sha256(&buf)
    }

    pub fn validate_basic(&self) -> Result<(), ValidationError> {
        if self.intermediate_state_roots.len() != self.txs.len() {
            return Err(ValidationError::UnevenIntermediateStateRoots {
                txs: self.txs.len(),
                roots: self.intermediate_state_roots.len(),
            });
        }
        Ok(())
    }
}
