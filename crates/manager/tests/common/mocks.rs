//! Test doubles for the manager's external collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cerulean_executor::{
    AppConnection, AppError, ExecuteBlockRequest, ExecuteBlockResponse, Mempool, TxResult,
};
use cerulean_types::{Hash, Tx};

/// Application backend that records executed heights and derives each new
/// app hash from the previous one, so state advances deterministically.
#[derive(Clone, Default)]
pub struct RecordingApp {
    pub executed_heights: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl AppConnection for RecordingApp {
    async fn execute_block(
        &self,
        request: ExecuteBlockRequest,
    ) -> Result<ExecuteBlockResponse, AppError> {
        self.executed_heights.lock().unwrap().push(request.height);

        let mut preimage = request.app_hash.into_inner().to_vec();
        preimage.extend_from_slice(&request.height.to_le_bytes());
        Ok(ExecuteBlockResponse {
            app_hash: Hash::sha256(&preimage),
            tx_results: request
                .txs
                .iter()
                .map(|tx| TxResult { code: 0, data: tx.clone() })
                .collect(),
        })
    }
}

/// Mempool over a shared vector; reaped transactions leave on removal.
#[derive(Clone, Default)]
pub struct VecMempool {
    txs: Arc<Mutex<Vec<Tx>>>,
}

impl VecMempool {
    pub fn push(&self, tx: Tx) {
        self.txs.lock().unwrap().push(tx);
    }

    pub fn len(&self) -> usize {
        self.txs.lock().unwrap().len()
    }
}

impl Mempool for VecMempool {
    fn reap_txs(&self, _max_bytes: u64) -> Vec<Tx> {
        self.txs.lock().unwrap().clone()
    }

    fn remove_txs(&self, txs: &[Tx]) {
        self.txs.lock().unwrap().retain(|tx| !txs.contains(tx));
    }
}
