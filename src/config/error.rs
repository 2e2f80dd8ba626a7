//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("{field} must be within [{min}, {max}], got {actual}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        actual: f64,
    },

    #[error("Invalid recommendation settings: {0}")]
    InvalidRecommendationSettings(String),
}

impl ValidationError {
    pub(crate) fn out_of_range(field: &'static str, min: f64, max: f64, actual: f64) -> Self {
        ValidationError::OutOfRange {
            field,
            min,
            max,
            actual,
        }
    }
}
