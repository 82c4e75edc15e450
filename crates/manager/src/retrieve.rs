use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use cerulean_da::{DaResult, DataAvailabilityClient, RetrieveBlockResult, StatusCode};
use cerulean_store::Store;
use cerulean_types::Block;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{error::ManagerError, metrics::ManagerMetrics};

/// Follower-side worker: on each wake signal, fetches every height between
/// the store tip and the announced sync target from the DA layer.
pub(crate) struct Retriever {
    pub(crate) store: Store,
    pub(crate) da: Arc<dyn DataAvailabilityClient>,
    pub(crate) block_in: mpsc::Sender<Block>,
    pub(crate) wake: mpsc::Receiver<()>,
    pub(crate) sync_target: Arc<AtomicU64>,
    pub(crate) max_retries: u32,
    pub(crate) retry_pause: Duration,
    pub(crate) metrics: ManagerMetrics,
}

impl Retriever {
    pub(crate) async fn run(mut self, token: CancellationToken) -> Result<(), ManagerError> {
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                signal = self.wake.recv() => {
                    if signal.is_none() {
                        return Ok(());
                    }
                    let target = self.sync_target.load(Ordering::SeqCst);
                    let mut height = self.store.height() + 1;
                    while height <= target && !token.is_cancelled() {
                        debug!(height, target, "retrieving block from DA layer");
                        self.fetch_block(&token, height).await?;
                        height += 1;
                    }
                }
            }
        }
    }

    /// Fetches one height, retrying transient failures with a fixed pause.
    /// Running out of retries is fatal for the manager.
    async fn fetch_block(
        &self,
        token: &CancellationToken,
        height: u64,
    ) -> Result<(), ManagerError> {
        let mut last_message = String::new();

        for attempt in 1..=self.max_retries {
            self.metrics.retrieve_attempt();
            let retrieved = self.da.retrieve_block(height).await.normalized(height);

            match retrieved {
                RetrieveBlockResult {
                    result: DaResult { code: StatusCode::Success, .. },
                    block: Some(block),
                } => {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        sent = self.block_in.send(block) => {
                            if sent.is_err() {
                                debug!(height, "sync worker is gone, discarding block");
                            }
                        }
                    }
                    return Ok(());
                }
                RetrieveBlockResult { result, .. } => {
                    last_message = result.message.unwrap_or_default();
                    self.metrics.retrieve_failed();
                    warn!(
                        height,
                        attempt,
                        code = ?result.code,
                        error = %last_message,
                        phase = "retrieve",
                        "block retrieval attempt failed"
                    );
                    if attempt < self.max_retries {
                        tokio::select! {
                            _ = token.cancelled() => return Ok(()),
                            () = tokio::time::sleep(self.retry_pause) => {}
                        }
                    }
                }
            }
        }

        error!(
            height,
            error = %last_message,
            phase = "retrieve",
            "retries exhausted, giving up"
        );
        Err(ManagerError::RetrievalExhausted {
            height,
            attempts: self.max_retries,
            message: last_message,
        })
    }
}
