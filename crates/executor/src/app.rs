use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use cerulean_types::{Hash, NamespaceId, Tx};

use crate::error::AppError;

/// Everything the application needs to execute one block's transactions.
#[derive(Clone, Debug)]
pub struct ExecuteBlockRequest {
    pub namespace_id: NamespaceId,
    pub chain_id: String,
    pub height: u64,
    /// Unix nanoseconds from the block header.
    pub time: u64,
    pub txs: Vec<Tx>,
    /// Application hash the backend is expected to start from.
    pub app_hash: Hash,
}

/// Result of executing a single transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxResult {
    /// Zero for success, application-defined otherwise.
    pub code: u32,
    pub data: Bytes,
}

#[derive(Clone, Debug)]
pub struct ExecuteBlockResponse {
    pub app_hash: Hash,
    pub tx_results: Vec<TxResult>,
}

/// Deterministic root over a block's transaction results, committed to by
/// the *next* header's `last_results_hash`.
pub fn results_hash(results: &[TxResult]) -> Hash {
    let mut buf = BytesMut::new();
    buf.put_u32_le(results.len() as u32);
    for result in results {
        buf.put_u32_le(result.code);
        buf.put_u32_le(result.data.len() as u32);
        buf.put_slice(&result.data);
    }
    Hash::sha256(&buf)
}

/// Connection to the application state machine.
///
/// Implementations live outside this crate; the executor only requires that
/// execution is deterministic for a given request and that the backend does
/// not mutate state it has not been handed.
#[async_trait]
pub trait AppConnection: Send + Sync {
    async fn execute_block(
        &self,
        request: ExecuteBlockRequest,
    ) -> Result<ExecuteBlockResponse, AppError>;
}

/// Transaction source for block construction. Opaque ordering; the executor
/// takes whatever the pool hands out.
pub trait Mempool: Send + Sync {
    /// Returns transactions totalling at most `max_bytes`.
    fn reap_txs(&self, max_bytes: u64) -> Vec<Tx>;

    /// Drops transactions that made it into a block.
    fn remove_txs(&self, txs: &[Tx]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_hash_is_code_and_data_sensitive() {
        let ok = TxResult { code: 0, data: Bytes::from_static(b"out") };
        let failed = TxResult { code: 1, data: Bytes::from_static(b"out") };
        let other = TxResult { code: 0, data: Bytes::from_static(b"other") };

        assert_ne!(results_hash(&[ok.clone()]), results_hash(&[failed]));
        assert_ne!(results_hash(&[ok.clone()]), results_hash(&[other]));
        assert_ne!(results_hash(&[]), results_hash(&[ok]));
    }
}
