//! Stateless facade between the block manager and the application: block
//! construction on the proposer, block application everywhere.

#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]
#![allow(missing_docs)]

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use cerulean_types::{Block, Commit, Data, Hash, Header, NamespaceId, SignedHeader, State};

mod app;
mod error;

pub use app::{
    results_hash, AppConnection, ExecuteBlockRequest, ExecuteBlockResponse, Mempool, TxResult,
};
pub use error::{AppError, ExecutorError};

use tracing::debug;

/// Builds and applies blocks on behalf of the manager.
///
/// Holds no chain state of its own; every call receives the state it should
/// work from and returns a new one, leaving the input untouched.
pub struct BlockExecutor<A, M> {
    proposer_address: Bytes,
    namespace_id: NamespaceId,
    mempool: M,
    app: A,
}

impl<A: AppConnection, M: Mempool> BlockExecutor<A, M> {
    pub fn new(proposer_address: Bytes, namespace_id: NamespaceId, mempool: M, app: A) -> Self {
        Self { proposer_address, namespace_id, mempool, app }
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn mempool(&self) -> &M {
        &self.mempool
    }

    /// Constructs a well-formed block at `height` chained onto `state`.
    ///
    /// Deterministic given the mempool contents, the state, the height and
    /// `last_commit` (up to the header timestamp).
    pub fn create_block(&self, height: u64, last_commit: &Commit, state: &State) -> Block {
        let txs = self.mempool.reap_txs(state.consensus_params.max_block_bytes);
        debug!(height, num_txs = txs.len(), "creating block");

        // One root per transaction; the roots stay zero until the
        // application reports real intermediate state.
        let data = Data {
            intermediate_state_roots: vec![Hash::ZERO; txs.len()],
            txs,
        };
        let header = Header {
            height,
            time: unix_now_nanos(),
            chain_id: state.chain_id.clone(),
            version: state.version,
            last_header_hash: state.last_block_hash,
            last_commit_hash: last_commit.hash(),
            data_hash: data.hash(),
            consensus_hash: state.consensus_params.hash(),
            app_hash: state.app_hash,
            last_results_hash: state.last_results_hash,
            proposer_address: self.proposer_address.clone(),
            aggregators_hash: state.validators.hash(),
            next_aggregators_hash: state.next_validators.hash(),
        };

        Block {
            signed_header: SignedHeader {
                header,
                last_commit: last_commit.clone(),
                validators: state.validators.clone(),
            },
            data,
        }
    }

    /// Executes `block` against `state` and returns the advanced state plus
    /// the per-transaction results.
    ///
    /// Fails with an invalid-block error for malformed input before the
    /// application is consulted; an [`ExecutorError::App`] afterwards is
    /// retriable only if the backend says so.
    pub async fn apply_block(
        &self,
        state: &State,
        block: &Block,
    ) -> Result<(State, Vec<TxResult>), ExecutorError> {
        self.validate(state, block)?;

        let header = block.header();
        let request = ExecuteBlockRequest {
            namespace_id: self.namespace_id,
            chain_id: header.chain_id.clone(),
            height: header.height,
            time: header.time,
            txs: block.data.txs.clone(),
            app_hash: state.app_hash,
        };
        let response = self.app.execute_block(request).await.map_err(ExecutorError::App)?;

        let new_state = State {
            version: state.version,
            chain_id: state.chain_id.clone(),
            initial_height: state.initial_height,
            last_block_height: header.height,
            last_block_hash: header.hash(),
            last_block_time: header.time,
            validators: state.next_validators.clone(),
            next_validators: state.next_validators.clone(),
            consensus_params: state.consensus_params,
            last_results_hash: results_hash(&response.tx_results),
            app_hash: response.app_hash,
        };

        self.mempool.remove_txs(&block.data.txs);

        Ok((new_state, response.tx_results))
    }

    fn validate(&self, state: &State, block: &Block) -> Result<(), ExecutorError> {
        block.validate_basic()?;

        let header = block.header();
        if header.height != state.last_block_height + 1 {
            return Err(ExecutorError::UnexpectedHeight {
                applied: state.last_block_height,
                got: header.height,
            });
        }
        if header.chain_id != state.chain_id {
            return Err(ExecutorError::ChainIdMismatch {
                expected: state.chain_id.clone(),
                got: header.chain_id.clone(),
            });
        }
        Ok(())
    }
}

fn unix_now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}
