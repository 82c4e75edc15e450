use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use cerulean_executor::{AppConnection, BlockExecutor, Mempool};
use cerulean_store::{Store, StoreError};
use cerulean_types::{Block, Commit, Header, State, ValidationError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{error::ManagerError, metrics::ManagerMetrics};

/// Follower-side worker: absorbs gossiped headers and retrieved block
/// bodies, and drains the staging cache in height order.
///
/// The cache is owned exclusively by this worker; the retrieve loop hands
/// blocks over through the inbound channel.
pub(crate) struct SyncWorker<A, M> {
    pub(crate) store: Store,
    pub(crate) executor: BlockExecutor<A, M>,
    pub(crate) last_state: State,
    pub(crate) cache: BTreeMap<u64, Block>,
    pub(crate) header_in: Option<mpsc::Receiver<Header>>,
    pub(crate) block_in: mpsc::Receiver<Block>,
    pub(crate) wake: mpsc::Sender<()>,
    pub(crate) sync_target: Arc<AtomicU64>,
    pub(crate) metrics: ManagerMetrics,
}

impl<A: AppConnection, M: Mempool> SyncWorker<A, M> {
    pub(crate) async fn run(mut self, token: CancellationToken) -> Result<(), ManagerError> {
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                header = recv_or_pending(&mut self.header_in) => {
                    match header {
                        Some(header) => self.handle_header(header),
                        None => {
                            // Gossip side disconnected; block bodies can
                            // still arrive for already-announced heights.
                            warn!("inbound header channel closed");
                            self.header_in = None;
                        }
                    }
                }
                block = self.block_in.recv() => {
                    match block {
                        Some(block) => self.handle_block(block).await?,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Records a header announcement and pokes the retrieve loop if it
    /// advertises unseen heights. Multiple announcements coalesce into a
    /// single pending wake.
    pub(crate) fn handle_header(&mut self, header: Header) {
        debug!(height = header.height, hash = %header.hash(), "block header received");
        if header.height > self.store.height() {
            self.sync_target.fetch_max(header.height, Ordering::SeqCst);
            let _ = self.wake.try_send(());
        }
    }

    /// Stages a retrieved block and applies every height whose successor is
    /// already in hand.
    pub(crate) async fn handle_block(&mut self, block: Block) -> Result<(), ManagerError> {
        let height = block.height();
        debug!(height, hash = %block.hash(), "block body retrieved from DA layer");

        if height <= self.store.height() {
            debug!(height, "block already applied, ignoring");
            return Ok(());
        }
        if let Err(err) = block.validate_basic() {
            error!(height, error = %err, phase = "sync", "malformed block received, dropping");
            return Ok(());
        }

        self.cache.insert(height, block);
        self.metrics.set_staged_blocks(self.cache.len());
        self.drain_cache().await
    }

    /// Applies and persists staged blocks while both `height+1` and
    /// `height+2` are present.
    ///
    /// Block `h` is saved only once block `h+1` is in hand, because the
    /// commit authenticating `h` travels in `h+1`. The newest staged block
    /// therefore always waits for its successor.
    async fn drain_cache(&mut self) -> Result<(), ManagerError> {
        loop {
            let current = self.store.height();
            let window = match (self.cache.get(&(current + 1)), self.cache.get(&(current + 2))) {
                (Some(b1), Some(b2)) => match self.verify_window(b1, b2) {
                    Ok(()) => Ok((b1.clone(), b2.last_commit().clone())),
                    Err(err) => Err(err),
                },
                _ => return Ok(()),
            };

            match window {
                Err(err) => {
                    // Either block of the pair may be the forged one; drop
                    // both and let retrieval converge on what DA holds.
                    error!(
                        height = current + 1,
                        error = %err,
                        phase = "sync",
                        "chain verification failed, dropping staged blocks"
                    );
                    self.cache.remove(&(current + 1));
                    self.cache.remove(&(current + 2));
                    self.metrics.set_staged_blocks(self.cache.len());
                    return Ok(());
                }
                Ok((block, commit)) => {
                    if !self.apply_and_persist(block, commit).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Applies one block; returns `false` when draining should stop without
    /// the manager dying (application errors leave the block staged).
    async fn apply_and_persist(
        &mut self,
        block: Block,
        commit: Commit,
    ) -> Result<bool, ManagerError> {
        let height = block.height();

        let (new_state, _) = match self.executor.apply_block(&self.last_state, &block).await {
            Ok(applied) => applied,
            Err(err) => {
                // The block stays staged; the next arrival retries it.
                error!(height, error = %err, phase = "sync", "failed to apply block");
                return Ok(false);
            }
        };

        match self.store.save_block(&block, &commit).await {
            Ok(()) => {}
            Err(StoreError::Conflict(conflicting)) => {
                error!(
                    height = conflicting,
                    phase = "sync",
                    "divergent block already stored, dropping staged copy"
                );
                self.cache.remove(&height);
                self.metrics.set_staged_blocks(self.cache.len());
                return Ok(false);
            }
            Err(source) => {
                return Err(ManagerError::Store { phase: "save block", source });
            }
        }

        self.store
            .update_state(&new_state)
            .await
            .map_err(|source| ManagerError::Store { phase: "update state", source })?;
        self.last_state = new_state;

        // The height just saved; its successor stays staged as the next b1.
        self.cache.remove(&self.store.height());
        self.metrics.set_staged_blocks(self.cache.len());
        self.metrics.block_applied();
        debug!(height, "block applied and persisted");
        Ok(true)
    }

    /// Checks that `b2` authenticates `b1` before `b1` is committed to the
    /// store: continuity with the applied chain, the adjacent aggregator-set
    /// link, and the proposer signature carried in `b2.last_commit`.
    fn verify_window(&self, b1: &Block, b2: &Block) -> Result<(), ValidationError> {
        if b1.header().last_header_hash != self.last_state.last_block_hash {
            return Err(ValidationError::LastHeaderHashMismatch {
                expected: self.last_state.last_block_hash,
                got: b1.header().last_header_hash,
            });
        }
        b1.header().verify(b2.header())?;
        b2.last_commit().verify(b1.header())
    }
}

/// Receives from the header channel, or parks forever once gossip is gone.
async fn recv_or_pending(receiver: &mut Option<mpsc::Receiver<Header>>) -> Option<Header> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use cerulean_executor::{
        AppConnection, AppError, ExecuteBlockRequest, ExecuteBlockResponse, TxResult,
    };
    use cerulean_store::StoreMetrics;
    use cerulean_types::{
        genesis::Genesis,
        test_utils::{build_chain, test_genesis, test_keypair},
        Hash, Tx,
    };

    use super::*;

    struct ChainingApp {
        executed_heights: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl AppConnection for ChainingApp {
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

    struct NoopMempool;

    impl Mempool for NoopMempool {
        fn reap_txs(&self, _max_bytes: u64) -> Vec<Tx> {
            Vec::new()
        }

        fn remove_txs(&self, _txs: &[Tx]) {}
    }

    struct Harness {
        worker: SyncWorker<ChainingApp, NoopMempool>,
        genesis: Genesis,
        _dir: tempfile::TempDir,
        // Keep the sender halves alive so the worker's channels stay open.
        _block_in: mpsc::Sender<Block>,
        wake_rx: mpsc::Receiver<()>,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let (genesis, provider) = test_genesis("sync-chain", 1);
        let store = Store::open(
            dir.path().join("store.redb"),
            genesis.initial_height,
            StoreMetrics::new(),
        )
        .unwrap();
        let executor = cerulean_executor::BlockExecutor::new(
            provider.address(),
            *b"cerulean",
            NoopMempool,
            ChainingApp { executed_heights: Mutex::new(Vec::new()) },
        );

        let (block_in_tx, block_in_rx) = mpsc::channel(8);
        let (wake_tx, wake_rx) = mpsc::channel(1);

        let worker = SyncWorker {
            store,
            executor,
            last_state: State::from_genesis(&genesis),
            cache: BTreeMap::new(),
            header_in: None,
            block_in: block_in_rx,
            wake: wake_tx,
            sync_target: Arc::new(AtomicU64::new(0)),
            metrics: ManagerMetrics::new(),
        };

        Harness { worker, genesis, _dir: dir, _block_in: block_in_tx, wake_rx }
    }

    #[tokio::test]
    async fn out_of_order_arrival_applies_in_order() {
        let mut harness = harness();
        let provider = test_keypair(1);
        let chain = build_chain(&harness.genesis, &provider, 5);

        // Heights 3, 1: nothing can apply without a contiguous pair.
        harness.worker.handle_block(chain[2].clone()).await.unwrap();
        harness.worker.handle_block(chain[0].clone()).await.unwrap();
        assert_eq!(harness.worker.store.height(), 0);

        // Height 2 closes the gap: 1 and 2 drain in one pass (3 is the
        // staged successor).
        harness.worker.handle_block(chain[1].clone()).await.unwrap();
        assert_eq!(harness.worker.store.height(), 2);

        // 4 finalizes 3; 5 finalizes 4 and stays staged awaiting 6.
        harness.worker.handle_block(chain[3].clone()).await.unwrap();
        assert_eq!(harness.worker.store.height(), 3);
        harness.worker.handle_block(chain[4].clone()).await.unwrap();
        assert_eq!(harness.worker.store.height(), 4);
        assert!(harness.worker.cache.contains_key(&5));

        // Application happened in height order despite the arrival order.
        let heights = harness.worker.executor_heights();
        assert_eq!(heights, vec![1, 2, 3, 4]);

        // Every saved block chains onto its predecessor and carries the
        // commit that names it.
        for height in 1..=4 {
            let block = harness.worker.store.load_block(height).await.unwrap();
            let commit = harness.worker.store.load_commit(height).await.unwrap();
            commit.verify(block.header()).unwrap();
        }
    }

    #[tokio::test]
    async fn double_delivery_is_idempotent() {
        let mut harness = harness();
        let provider = test_keypair(1);
        let chain = build_chain(&harness.genesis, &provider, 3);

        harness.worker.handle_block(chain[0].clone()).await.unwrap();
        harness.worker.handle_block(chain[0].clone()).await.unwrap();
        harness.worker.handle_block(chain[1].clone()).await.unwrap();
        assert_eq!(harness.worker.store.height(), 1);

        // Re-delivering an applied block is a no-op.
        harness.worker.handle_block(chain[0].clone()).await.unwrap();
        assert_eq!(harness.worker.store.height(), 1);
        assert_eq!(harness.worker.executor_heights(), vec![1]);
        assert_eq!(
            harness.worker.store.load_block(1).await.unwrap(),
            chain[0]
        );

        // Re-delivering the staged tip does not duplicate it either.
        harness.worker.handle_block(chain[1].clone()).await.unwrap();
        assert_eq!(harness.worker.cache.len(), 1);
    }

    #[tokio::test]
    async fn malformed_block_is_dropped_without_staging() {
        let mut harness = harness();
        let provider = test_keypair(1);
        let mut chain = build_chain(&harness.genesis, &provider, 1);

        chain[0].data.txs.push(Tx::from_static(b"smuggled"));
        harness.worker.handle_block(chain[0].clone()).await.unwrap();
        assert!(harness.worker.cache.is_empty());
    }

    #[tokio::test]
    async fn forged_commit_drops_the_window() {
        let mut harness = harness();
        let proposer = test_keypair(1);
        let intruder = test_keypair(66);
        let mut chain = build_chain(&harness.genesis, &proposer, 2);

        // Re-sign block 2's embedded commit with the wrong key, keeping the
        // block internally consistent so it passes basic validation.
        let header_one = chain[0].header().clone();
        let forged = Commit {
            height: header_one.height,
            header_hash: header_one.hash(),
            signatures: vec![intruder.sign(&header_one.encode_canonical())],
        };
        chain[1].signed_header.last_commit = forged.clone();
        chain[1].signed_header.header.last_commit_hash = forged.hash();

        harness.worker.handle_block(chain[0].clone()).await.unwrap();
        harness.worker.handle_block(chain[1].clone()).await.unwrap();

        // Verification failed: nothing saved, both staged entries gone.
        assert_eq!(harness.worker.store.height(), 0);
        assert!(harness.worker.cache.is_empty());
        assert!(harness.worker.executor_heights().is_empty());
    }

    #[tokio::test]
    async fn header_announcements_raise_target_and_coalesce() {
        let mut harness = harness();
        let provider = test_keypair(1);
        let chain = build_chain(&harness.genesis, &provider, 3);

        harness.worker.handle_header(chain[2].header().clone());
        harness.worker.handle_header(chain[0].header().clone());
        harness.worker.handle_header(chain[1].header().clone());

        // Out-of-order announcements never lower the target.
        assert_eq!(harness.worker.sync_target.load(Ordering::SeqCst), 3);
        // Wakes coalesced into the single slot.
        assert!(harness.wake_rx.try_recv().is_ok());
        assert!(harness.wake_rx.try_recv().is_err());
    }

    impl SyncWorker<ChainingApp, NoopMempool> {
        fn executor_heights(&self) -> Vec<u64> {
            self.executor.app().executed_heights.lock().unwrap().clone()
        }
    }
}
