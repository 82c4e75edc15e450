//! Proposer-side scenarios: genesis production, steady-state cadence,
//! prompt cancellation.

mod common;

use std::time::Duration;

use bytes::Bytes;
use cerulean_manager::{BlockManagerConfig, Role};
use common::{spawn, spawn_with_mempool, TEST_CHAIN_ID};

#[tokio::test]
async fn genesis_block_production() {
    let mempool = common::mocks::VecMempool::default();
    mempool.push(Bytes::from_static(b"tx-1"));
    mempool.push(Bytes::from_static(b"tx-2"));

    let mut harness = spawn_with_mempool(
        Role::Proposer,
        BlockManagerConfig::with_block_time(Duration::from_millis(25)),
        mempool,
    )
    .await;

    let header = tokio::time::timeout(Duration::from_secs(2), harness.bridge.outbound.recv())
        .await
        .expect("first announcement within two seconds")
        .expect("outbound channel open");
    assert_eq!(header.height, 1);
    assert_eq!(header.chain_id, TEST_CHAIN_ID);

    assert!(harness.store.height() >= 1);
    let block = harness.store.load_block(1).await.unwrap();

    // The first block carries the synthetic zero commit.
    let last_commit = block.last_commit();
    assert_eq!(last_commit.height, 0);
    assert!(last_commit.header_hash.is_zero());
    assert!(last_commit.signatures.is_empty());

    // Mempool contents made it into the block and left the pool.
    assert_eq!(block.data.txs.len(), 2);
    assert_eq!(harness.mempool.len(), 0);

    // The stored commit authenticates the header it names.
    let commit = harness.store.load_commit(1).await.unwrap();
    commit.verify(block.header()).unwrap();

    assert_eq!(harness.da.submitted_heights()[0], 1);
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn steady_state_production() {
    let mut harness = spawn(
        Role::Proposer,
        BlockManagerConfig::with_block_time(Duration::from_millis(10)),
    )
    .await;

    let mut announced = Vec::new();
    while announced.len() < 5 {
        let header =
            tokio::time::timeout(Duration::from_secs(2), harness.bridge.outbound.recv())
                .await
                .expect("announcement within two seconds")
                .expect("outbound channel open");
        announced.push(header.height);
    }
    assert_eq!(announced, vec![1, 2, 3, 4, 5]);
    assert!(harness.store.height() >= 5);

    // Heights 1..5 chain: every header links its predecessor's hash and
    // aggregator set, and every stored commit verifies.
    let mut previous: Option<cerulean_types::Block> = None;
    for height in 1..=5 {
        let block = harness.store.load_block(height).await.unwrap();
        let commit = harness.store.load_commit(height).await.unwrap();
        commit.verify(block.header()).unwrap();
        assert_eq!(commit.height, height);

        if let Some(prev_block) = &previous {
            prev_block.header().verify(block.header()).unwrap();
            assert_eq!(block.last_commit().height, height - 1);
        }
        previous = Some(block);
    }

    // DA saw the same heights, in order.
    assert_eq!(&harness.da.submitted_heights()[..5], &[1, 2, 3, 4, 5]);

    // Application executed each height exactly once, in order.
    assert_eq!(&harness.app.executed_heights.lock().unwrap()[..5], &[1, 2, 3, 4, 5]);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn proposer_cancellation_is_prompt() {
    let harness = spawn(
        Role::Proposer,
        BlockManagerConfig::with_block_time(Duration::from_millis(10)),
    )
    .await;

    // Let it produce a little, then cancel and require a quick exit.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let store = harness.store.clone();
    tokio::time::timeout(Duration::from_millis(500), harness.shutdown())
        .await
        .expect("run returns within one suspension point")
        .expect("clean exit");

    // No further writes after cancellation.
    let height = store.height();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.height(), height);
}
