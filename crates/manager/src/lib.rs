//! The block manager: single-proposer block production and DA-driven
//! synchronization.
//!
//! A proposer runs the aggregation loop: every `block_time` it pulls
//! transactions through the executor, signs and persists the resulting
//! block, submits it to the DA layer and announces the header. A follower
//! runs the sync and retrieve loops: gossiped headers raise the sync
//! target, block bodies are fetched from DA by height into a staging
//! cache, and the cache is drained in order. Block `h` is applied and
//! saved only once block `h+1` is in hand, because `h+1` carries the
//! commit that authenticates `h`.

#![forbid(unsafe_code)]
#![deny(trivial_casts, trivial_numeric_casts)]
#![allow(missing_docs)]

use std::{
    collections::BTreeMap,
    sync::{atomic::AtomicU64, Arc},
};

use cerulean_da::DataAvailabilityClient;
use cerulean_executor::{AppConnection, BlockExecutor, Mempool};
use cerulean_store::{Store, StoreError};
use cerulean_types::{genesis::Genesis, signing::Ed25519Provider, Block, Header, State};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod aggregation;
mod config;
mod error;
mod metrics;
mod retrieve;
mod sync;

pub use config::{
    BlockManagerConfig, DEFAULT_MAX_RETRIEVE_RETRIES, DEFAULT_RETRIEVE_RETRY_PAUSE,
};
pub use error::{ConfigError, ManagerError};
pub use metrics::ManagerMetrics;

use aggregation::Aggregator;
use retrieve::Retriever;
use sync::SyncWorker;

/// Single-slot announcement channel; the aggregation loop waits on it at
/// most one block interval.
const HEADER_OUT_CAPACITY: usize = 1;
const HEADER_IN_CAPACITY: usize = 64;
const BLOCK_IN_CAPACITY: usize = 64;

/// Which of the two mutually exclusive roles this manager plays.
///
/// Exactly one role runs per node; the store has a single writer either
/// way.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// Produces blocks and publishes them to DA.
    Proposer,
    /// Follows DA and replays blocks announced over gossip.
    Follower,
}

/// Channel pair handed to the external P2P layer.
///
/// Single reader, single writer. Headers may arrive inbound in any order;
/// the manager absorbs reordering internally.
pub struct HeaderGossipBridge {
    /// Headers announced by this node (proposer role).
    pub outbound: mpsc::Receiver<Header>,
    /// Headers observed on the network (follower role).
    pub inbound: mpsc::Sender<Header>,
}

/// Owns the chain state and the loops that advance it.
pub struct Manager<A, M> {
    role: Role,
    config: BlockManagerConfig,
    genesis: Genesis,
    signer: Ed25519Provider,
    store: Store,
    executor: BlockExecutor<A, M>,
    da: Arc<dyn DataAvailabilityClient>,
    last_state: State,
    metrics: ManagerMetrics,

    header_out: mpsc::Sender<Header>,
    header_in: mpsc::Receiver<Header>,
    block_in_tx: mpsc::Sender<Block>,
    block_in_rx: mpsc::Receiver<Block>,
    wake_tx: mpsc::Sender<()>,
    wake_rx: mpsc::Receiver<()>,
    sync_target: Arc<AtomicU64>,
}

impl<A: AppConnection, M: Mempool> Manager<A, M> {
    /// Wires a manager: loads the stored state (or bootstraps from
    /// genesis), derives the proposer address from the signing key, and
    /// sets up the channels between the loops and the gossip bridge.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        signer: Ed25519Provider,
        config: BlockManagerConfig,
        genesis: Genesis,
        role: Role,
        store: Store,
        mempool: M,
        app: A,
        da: Arc<dyn DataAvailabilityClient>,
    ) -> Result<(Self, HeaderGossipBridge), ManagerError> {
        config.validate()?;

        let last_state = initial_state(&store, &genesis).await?;
        info!(
            chain_id = %last_state.chain_id,
            height = last_state.last_block_height,
            ?role,
            "block manager starting"
        );

        let executor =
            BlockExecutor::new(signer.address(), config.namespace_id, mempool, app);

        let (header_out_tx, header_out_rx) = mpsc::channel(HEADER_OUT_CAPACITY);
        let (header_in_tx, header_in_rx) = mpsc::channel(HEADER_IN_CAPACITY);
        let (block_in_tx, block_in_rx) = mpsc::channel(BLOCK_IN_CAPACITY);
        let (wake_tx, wake_rx) = mpsc::channel(1);

        let manager = Self {
            role,
            config,
            genesis,
            signer,
            store,
            executor,
            da,
            last_state,
            metrics: ManagerMetrics::new(),
            header_out: header_out_tx,
            header_in: header_in_rx,
            block_in_tx,
            block_in_rx,
            wake_tx,
            wake_rx,
            sync_target: Arc::new(AtomicU64::new(0)),
        };
        let bridge = HeaderGossipBridge { outbound: header_out_rx, inbound: header_in_tx };

        Ok((manager, bridge))
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn metrics(&self) -> ManagerMetrics {
        self.metrics.clone()
    }

    /// Drives the role's loops until cancellation or a fatal error.
    ///
    /// Every loop returns promptly at its next suspension point once
    /// `token` is cancelled.
    pub async fn run(self, token: CancellationToken) -> Result<(), ManagerError> {
        match self.role {
            Role::Proposer => {
                let aggregator = Aggregator {
                    config: self.config,
                    genesis: self.genesis,
                    signer: self.signer,
                    store: self.store,
                    executor: self.executor,
                    da: self.da,
                    last_state: self.last_state,
                    header_out: self.header_out,
                    metrics: self.metrics,
                };
                aggregator.run(token).await
            }
            Role::Follower => {
                let retriever = Retriever {
                    store: self.store.clone(),
                    da: self.da,
                    block_in: self.block_in_tx,
                    wake: self.wake_rx,
                    sync_target: Arc::clone(&self.sync_target),
                    max_retries: self.config.max_retrieve_retries,
                    retry_pause: self.config.retrieve_retry_pause,
                    metrics: self.metrics.clone(),
                };
                let sync = SyncWorker {
                    store: self.store,
                    executor: self.executor,
                    last_state: self.last_state,
                    cache: BTreeMap::new(),
                    header_in: Some(self.header_in),
                    block_in: self.block_in_rx,
                    wake: self.wake_tx,
                    sync_target: self.sync_target,
                    metrics: self.metrics,
                };

                // Both workers live in this task; the first fatal error (or
                // cancellation) tears the other down.
                tokio::select! {
                    result = retriever.run(token.clone()) => result,
                    result = sync.run(token) => result,
                }
            }
        }
    }
}

/// Stored state when there is one, genesis bootstrap otherwise.
async fn initial_state(store: &Store, genesis: &Genesis) -> Result<State, ManagerError> {
    match store.load_state().await {
        Ok(state) => Ok(state),
        Err(StoreError::StateNotFound) => Ok(State::from_genesis(genesis)),
        Err(source) => Err(ManagerError::Store { phase: "load state", source }),
    }
}
