use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use cerulean_types::Block;
use tracing::debug;

use crate::{DaResult, DataAvailabilityClient, RetrieveBlockResult};

/// In-memory DA layer.
///
/// Serves submitted (or pre-seeded) blocks by height and records every
/// call. Tests script transient failures by queuing responses that are
/// served before the stored block; clones share the same storage, so one
/// handle can seed while another is wired into a manager.
#[derive(Clone, Default)]
pub struct MockDaClient {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    blocks: Mutex<HashMap<u64, Block>>,
    submit_script: Mutex<VecDeque<DaResult>>,
    retrieve_script: Mutex<HashMap<u64, VecDeque<DaResult>>>,
    submit_calls: Mutex<Vec<u64>>,
    retrieve_calls: Mutex<Vec<u64>>,
}

impl MockDaClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `block` retrievable under its own height.
    pub fn seed_block(&self, block: Block) {
        self.inner.blocks.lock().unwrap().insert(block.height(), block);
    }

    /// Makes `block` retrievable under an arbitrary height, violating the
    /// retrieval contract on purpose.
    pub fn seed_block_at(&self, height: u64, block: Block) {
        self.inner.blocks.lock().unwrap().insert(height, block);
    }

    /// Queues a failure response for the next submission.
    pub fn script_submit_failure(&self, result: DaResult) {
        self.inner.submit_script.lock().unwrap().push_back(result);
    }

    /// Queues `count` copies of `result` to be served for `height` before
    /// any stored block is.
    pub fn script_retrieve_failures(&self, height: u64, result: DaResult, count: usize) {
        let mut script = self.inner.retrieve_script.lock().unwrap();
        let queue = script.entry(height).or_default();
        for _ in 0..count {
            queue.push_back(result.clone());
        }
    }

    /// Heights submitted so far, in call order.
    pub fn submitted_heights(&self) -> Vec<u64> {
        self.inner.submit_calls.lock().unwrap().clone()
    }

    /// Heights requested so far, in call order.
    pub fn retrieve_calls(&self) -> Vec<u64> {
        self.inner.retrieve_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataAvailabilityClient for MockDaClient {
    async fn submit_block(&self, block: &Block) -> DaResult {
        self.inner.submit_calls.lock().unwrap().push(block.height());

        if let Some(result) = self.inner.submit_script.lock().unwrap().pop_front() {
            debug!(height = block.height(), code = ?result.code, "mock DA scripted submit response");
            return result;
        }

        self.seed_block(block.clone());
        DaResult::success()
    }

    async fn retrieve_block(&self, height: u64) -> RetrieveBlockResult {
        self.inner.retrieve_calls.lock().unwrap().push(height);

        let scripted = self
            .inner
            .retrieve_script
            .lock()
            .unwrap()
            .get_mut(&height)
            .and_then(VecDeque::pop_front);
        if let Some(result) = scripted {
            debug!(height, code = ?result.code, "mock DA scripted retrieve response");
            return RetrieveBlockResult::failure(result);
        }

        match self.inner.blocks.lock().unwrap().get(&height) {
            Some(block) => RetrieveBlockResult::success(block.clone()),
            None => {
                RetrieveBlockResult::failure(DaResult::error(format!("no block at height {height}")))
            }
        }
    }
}
