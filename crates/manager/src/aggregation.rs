use std::{sync::Arc, time::Duration};

use cerulean_da::DataAvailabilityClient;
use cerulean_executor::{AppConnection, BlockExecutor, Mempool};
use cerulean_store::Store;
use cerulean_types::{genesis::Genesis, signing::Ed25519Provider, Block, Commit, Header, State};
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{config::BlockManagerConfig, error::ManagerError, metrics::ManagerMetrics};

/// Proposer-side worker: produces, persists and publishes one block per
/// `block_time` interval.
pub(crate) struct Aggregator<A, M> {
    pub(crate) config: BlockManagerConfig,
    pub(crate) genesis: Genesis,
    pub(crate) signer: Ed25519Provider,
    pub(crate) store: Store,
    pub(crate) executor: BlockExecutor<A, M>,
    pub(crate) da: Arc<dyn DataAvailabilityClient>,
    pub(crate) last_state: State,
    pub(crate) header_out: mpsc::Sender<Header>,
    pub(crate) metrics: ManagerMetrics,
}

impl<A: AppConnection, M: Mempool> Aggregator<A, M> {
    pub(crate) async fn run(mut self, token: CancellationToken) -> Result<(), ManagerError> {
        let mut sleep = self.config.block_time;
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                () = tokio::time::sleep(sleep) => {
                    let height = self.store.height() + 1;
                    let start = Instant::now();
                    let result = self.publish_block(&token).await;
                    let elapsed = start.elapsed();
                    match result {
                        Ok(()) => self.metrics.block_produced(elapsed, self.config.block_time),
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => {
                            error!(height, error = %err, phase = "aggregation", "error while publishing block");
                        }
                    }
                    sleep = self.remaining_sleep(elapsed);
                }
            }
        }
    }

    fn remaining_sleep(&self, elapsed: Duration) -> Duration {
        let sleep = self.config.block_time.saturating_sub(elapsed);
        if sleep.is_zero() {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                block_time_ms = self.config.block_time.as_millis() as u64,
                "block production exceeded the block interval"
            );
        }
        sleep
    }

    /// One aggregation tick: build, apply, sign, persist, submit, announce.
    async fn publish_block(&mut self, token: &CancellationToken) -> Result<(), ManagerError> {
        let new_height = self.store.height() + 1;

        // The first block of the chain has no previous commit to carry.
        let last_commit = if new_height == self.genesis.initial_height {
            Commit::zero(new_height - 1)
        } else {
            self.store
                .load_commit(new_height - 1)
                .await
                .map_err(|source| ManagerError::Store { phase: "load last commit", source })?
        };

        info!(height = new_height, "creating and publishing block");
        let block = self.executor.create_block(new_height, &last_commit, &self.last_state);
        debug!(height = new_height, num_txs = block.data.txs.len(), "block created");

        let (new_state, _) = self
            .executor
            .apply_block(&self.last_state, &block)
            .await
            .map_err(|source| {
                if source.is_retriable() {
                    ManagerError::App { height: new_height, source }
                } else {
                    ManagerError::OwnBlockInvalid { height: new_height, source }
                }
            })?;

        let signature = self.signer.sign(&block.header().encode_canonical());
        let commit = Commit {
            height: block.height(),
            header_hash: block.hash(),
            signatures: vec![signature],
        };

        self.store
            .save_block(&block, &commit)
            .await
            .map_err(|source| ManagerError::Store { phase: "save block", source })?;
        self.store
            .update_state(&new_state)
            .await
            .map_err(|source| ManagerError::Store { phase: "update state", source })?;
        self.last_state = new_state;

        self.broadcast_block(token, block).await
    }

    async fn broadcast_block(
        &self,
        token: &CancellationToken,
        block: Block,
    ) -> Result<(), ManagerError> {
        let height = block.height();
        let result = self.da.submit_block(&block).await;
        if !result.is_success() {
            self.metrics.da_submission_failed();
            return Err(ManagerError::DaSubmission {
                height,
                message: result.message.unwrap_or_default(),
            });
        }

        // The announcement waits for a consumer, but never longer than one
        // block interval, and cancellation always wins.
        let header = block.signed_header.header;
        tokio::select! {
            _ = token.cancelled() => Ok(()),
            sent = tokio::time::timeout(self.config.block_time, self.header_out.send(header)) => {
                match sent {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => {
                        warn!(height, "header consumer is gone; skipping announcement");
                        Ok(())
                    }
                    Err(_) => {
                        warn!(height, "outbound header channel blocked for a full block interval");
                        Ok(())
                    }
                }
            }
        }
    }
}
