use std::time::Duration;

use cerulean_types::NamespaceId;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_RETRIEVE_RETRIES: u32 = 10;
pub const DEFAULT_RETRIEVE_RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Runtime knobs recognized by the block manager.
///
/// The genesis document, not this config, carries `initial_height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockManagerConfig {
    /// Nominal aggregation interval.
    pub block_time: Duration,

    /// Opaque identifier forwarded to the executor for block construction.
    #[serde(default)]
    pub namespace_id: NamespaceId,

    /// Attempts per height before retrieval is declared exhausted.
    #[serde(default = "default_max_retrieve_retries")]
    pub max_retrieve_retries: u32,

    /// Pause between retrieval attempts.
    #[serde(default = "default_retrieve_retry_pause")]
    pub retrieve_retry_pause: Duration,
}

fn default_max_retrieve_retries() -> u32 {
    DEFAULT_MAX_RETRIEVE_RETRIES
}

fn default_retrieve_retry_pause() -> Duration {
    DEFAULT_RETRIEVE_RETRY_PAUSE
}

impl BlockManagerConfig {
    /// Config with defaults for everything but the block interval.
    pub fn with_block_time(block_time: Duration) -> Self {
        Self {
            block_time,
            namespace_id: NamespaceId::default(),
            max_retrieve_retries: DEFAULT_MAX_RETRIEVE_RETRIES,
            retrieve_retry_pause: DEFAULT_RETRIEVE_RETRY_PAUSE,
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_time.is_zero() {
            return Err(ConfigError::ZeroBlockTime);
        }
        if self.max_retrieve_retries == 0 {
            return Err(ConfigError::ZeroRetrieveRetries);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = BlockManagerConfig::with_block_time(Duration::from_secs(1));
        assert_eq!(config.max_retrieve_retries, 10);
        assert_eq!(config.retrieve_retry_pause, Duration::from_millis(100));
        config.validate().unwrap();
    }

    #[test]
    fn zero_block_time_is_rejected() {
        let config = BlockManagerConfig::with_block_time(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBlockTime)));
    }

    #[test]
    fn toml_round_trip_applies_defaults() {
        let content = "[block_time]\nsecs = 2\nnanos = 0\n";
        let config = BlockManagerConfig::from_toml(content).unwrap();
        assert_eq!(config.block_time, Duration::from_secs(2));
        assert_eq!(config.max_retrieve_retries, DEFAULT_MAX_RETRIEVE_RETRIES);

        let serialized = toml::to_string(&config).unwrap();
        assert_eq!(BlockManagerConfig::from_toml(&serialized).unwrap(), config);
    }
}
