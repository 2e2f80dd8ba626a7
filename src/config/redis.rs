//! Redis configuration for persisted recommendation snapshots.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// How long a snapshot survives without being rewritten
    #[serde(default = "default_snapshot_retention")]
    pub snapshot_retention_secs: u64,

    /// Key namespace for snapshot records
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.snapshot_retention_secs == 0 {
            return Err(ValidationError::out_of_range(
                "snapshot_retention_secs",
                1.0,
                f64::MAX,
                0.0,
            ));
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout(),
            snapshot_retention_secs: default_snapshot_retention(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_snapshot_retention() -> u64 {
    7 * 24 * 3600
}

fn default_key_prefix() -> String {
    "opportunity-matcher:recs".to_string()
}
