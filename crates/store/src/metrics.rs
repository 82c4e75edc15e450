use std::{ops::Deref, sync::Arc, time::Duration};

use prometheus_client::metrics::{
    counter::Counter,
    gauge::Gauge,
    histogram::{exponential_buckets, Histogram},
};

/// Store instrumentation: operation timings, byte volumes and the current
/// chain tip.
#[derive(Clone, Debug)]
pub struct StoreMetrics(Arc<Inner>);

impl Deref for StoreMetrics {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct Inner {
    read_time: Histogram,
    write_time: Histogram,
    read_bytes: Counter,
    write_bytes: Counter,
    height: Gauge,
}

impl Inner {
    pub fn new() -> Self {
        Self {
            read_time: Histogram::new(exponential_buckets(0.0001, 2.0, 12)),
            write_time: Histogram::new(exponential_buckets(0.0001, 2.0, 12)),
            read_bytes: Counter::default(),
            write_bytes: Counter::default(),
            height: Gauge::default(),
        }
    }
}

impl Default for Inner {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self(Arc::new(Inner::new()))
    }

    pub fn observe_read_time(&self, elapsed: Duration) {
        self.read_time.observe(elapsed.as_secs_f64());
    }

    pub fn observe_write_time(&self, elapsed: Duration) {
        self.write_time.observe(elapsed.as_secs_f64());
    }

    pub fn add_read_bytes(&self, bytes: u64) {
        self.read_bytes.inc_by(bytes);
    }

    pub fn add_write_bytes(&self, bytes: u64) {
        self.write_bytes.inc_by(bytes);
    }

    pub fn set_height(&self, height: u64) {
        self.height.set(height as i64);
    }
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}
