use std::{ops::Deref, sync::Arc, time::Duration};

use prometheus_client::metrics::{
    counter::Counter,
    gauge::Gauge,
    histogram::{exponential_buckets, Histogram},
};

/// Manager instrumentation across all three loops.
#[derive(Clone, Debug)]
pub struct ManagerMetrics(Arc<Inner>);

impl Deref for ManagerMetrics {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct Inner {
    // Aggregation
    blocks_produced: Counter,
    production_time: Histogram,
    /// Ticks whose production time exceeded the block interval; a steadily
    /// climbing value means the chain's pace has decoupled from block_time.
    slow_ticks: Counter,
    da_submission_failures: Counter,

    // Sync
    blocks_applied: Counter,
    staged_blocks: Gauge,

    // Retrieve
    retrieve_attempts: Counter,
    retrieve_failures: Counter,
}

impl Inner {
    pub fn new() -> Self {
        Self {
            blocks_produced: Counter::default(),
            production_time: Histogram::new(exponential_buckets(0.001, 2.0, 12)),
            slow_ticks: Counter::default(),
            da_submission_failures: Counter::default(),
            blocks_applied: Counter::default(),
            staged_blocks: Gauge::default(),
            retrieve_attempts: Counter::default(),
            retrieve_failures: Counter::default(),
        }
    }
}

impl Default for Inner {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerMetrics {
    pub fn new() -> Self {
        Self(Arc::new(Inner::new()))
    }

    pub fn block_produced(&self, elapsed: Duration, block_time: Duration) {
        self.blocks_produced.inc();
        self.production_time.observe(elapsed.as_secs_f64());
        if elapsed > block_time {
            self.slow_ticks.inc();
        }
    }

    pub fn da_submission_failed(&self) {
        self.da_submission_failures.inc();
    }

    pub fn block_applied(&self) {
        self.blocks_applied.inc();
    }

    pub fn set_staged_blocks(&self, count: usize) {
        self.staged_blocks.set(count as i64);
    }

    pub fn retrieve_attempt(&self) {
        self.retrieve_attempts.inc();
    }

    pub fn retrieve_failed(&self) {
        self.retrieve_failures.inc();
    }
}

impl Default for ManagerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
