#![allow(missing_docs)]

use cerulean_executor::ExecutorError;
use cerulean_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Store failure. Always fatal: either an invariant-required entry is
    /// missing, a write collided, or the database itself is unhealthy.
    #[error("store error during {phase}: {source}")]
    Store {
        phase: &'static str,
        #[source]
        source: StoreError,
    },

    /// The executor rejected a block this manager produced itself.
    #[error("own block rejected at height {height}: {source}")]
    OwnBlockInvalid {
        height: u64,
        #[source]
        source: ExecutorError,
    },

    /// The application backend refused a self-produced block but declared
    /// the failure retriable; the tick is abandoned and retried.
    #[error("application rejected block {height}: {source}")]
    App {
        height: u64,
        #[source]
        source: ExecutorError,
    },

    /// DA submission came back non-success. The block is already durable
    /// locally, so the next tick proceeds from the next height.
    #[error("DA submission failed for block {height}: {message}")]
    DaSubmission { height: u64, message: String },

    /// Retrieval retries exhausted; the operator must intervene.
    #[error("failed to retrieve block {height} from DA after {attempts} attempts: {message}")]
    RetrievalExhausted { height: u64, attempts: u32, message: String },
}

impl ManagerError {
    /// Fatal errors terminate the manager; the rest are logged by the loop
    /// that observed them and recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Store { .. }
                | Self::OwnBlockInvalid { .. }
                | Self::RetrievalExhausted { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("block_time must be greater than zero")]
    ZeroBlockTime,

    #[error("max_retrieve_retries must be at least 1")]
    ZeroRetrieveRetries,

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
