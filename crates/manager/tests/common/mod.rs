//! Shared helpers for manager integration tests.
//!
//! Every test owns a temporary store and an in-memory DA layer, spins a
//! real manager on the current Tokio runtime, and only mocks the
//! application surface.

#![allow(dead_code)]

pub mod mocks;

use std::{future::Future, sync::Arc, time::Duration};

use cerulean_da::MockDaClient;
use cerulean_manager::{
    BlockManagerConfig, HeaderGossipBridge, Manager, ManagerError, Role,
};
use cerulean_store::{Store, StoreMetrics};
use cerulean_types::{
    genesis::Genesis, signing::Ed25519Provider, test_utils::test_genesis,
};
use mocks::{RecordingApp, VecMempool};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const TEST_CHAIN_ID: &str = "cerulean-test";

/// A running manager plus handles to everything around it.
pub struct Harness {
    pub genesis: Genesis,
    pub provider: Ed25519Provider,
    pub store: Store,
    pub da: MockDaClient,
    pub app: RecordingApp,
    pub mempool: VecMempool,
    pub bridge: HeaderGossipBridge,
    pub token: CancellationToken,
    pub handle: JoinHandle<Result<(), ManagerError>>,
    _dir: TempDir,
}

impl Harness {
    /// Cancels the manager and returns its exit result.
    pub async fn shutdown(self) -> Result<(), ManagerError> {
        self.token.cancel();
        self.handle.await.expect("manager task panicked")
    }
}

pub async fn spawn(role: Role, config: BlockManagerConfig) -> Harness {
    spawn_with_mempool(role, config, VecMempool::default()).await
}

/// Variant for tests that must seed transactions before the first tick.
pub async fn spawn_with_mempool(
    role: Role,
    config: BlockManagerConfig,
    mempool: VecMempool,
) -> Harness {
    let dir = tempfile::tempdir().expect("create temp dir");
    let (genesis, provider) = test_genesis(TEST_CHAIN_ID, 1);

    let store = Store::open(
        dir.path().join("store.redb"),
        genesis.initial_height,
        StoreMetrics::new(),
    )
    .expect("open store");

    let da = MockDaClient::new();
    let app = RecordingApp::default();

    let (manager, bridge) = Manager::new(
        Ed25519Provider::from_seed([1; 32]),
        config,
        genesis.clone(),
        role,
        store.clone(),
        mempool.clone(),
        app.clone(),
        Arc::new(da.clone()),
    )
    .await
    .expect("construct manager");

    let token = CancellationToken::new();
    let handle = tokio::spawn(manager.run(token.clone()));

    Harness {
        genesis,
        provider,
        store,
        da,
        app,
        mempool,
        bridge,
        token,
        handle,
        _dir: dir,
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
