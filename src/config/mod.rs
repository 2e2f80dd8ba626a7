//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `OPPORTUNITY_MATCHER` prefix and nested values use `__` as separator.
//!
//! # Example
//!
//! ```no_run
//! use opportunity_matcher::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod database;
mod error;
mod recommendation;
mod redis;
mod server;

pub use self::redis::RedisConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use recommendation::{BehaviorConfig, NeighborsConfig, RecommendationConfig, RefreshConfig};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
/// Without a `database` section the service runs on in-memory stores;
/// without a `redis` section snapshots are kept in process.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection
    pub database: Option<DatabaseConfig>,

    /// Redis connection for recommendation snapshots
    pub redis: Option<RedisConfig>,

    /// Engine tunables
    #[serde(default)]
    pub recommendation: RecommendationConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `OPPORTUNITY_MATCHER` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `OPPORTUNITY_MATCHER__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `OPPORTUNITY_MATCHER__RECOMMENDATION__TOP_N=10` -> `recommendation.top_n = 10`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("OPPORTUNITY_MATCHER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        self.recommendation.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "OPPORTUNITY_MATCHER__DATABASE__URL",
        "OPPORTUNITY_MATCHER__REDIS__URL",
        "OPPORTUNITY_MATCHER__SERVER__PORT",
        "OPPORTUNITY_MATCHER__SERVER__ENVIRONMENT",
        "OPPORTUNITY_MATCHER__RECOMMENDATION__TOP_N",
        "OPPORTUNITY_MATCHER__RECOMMENDATION__NEIGHBORS__K",
    ];

    fn set_full_env() {
        env::set_var("OPPORTUNITY_MATCHER__DATABASE__URL", "postgresql://test@localhost/test");
        env::set_var("OPPORTUNITY_MATCHER__REDIS__URL", "redis://localhost:6379");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_full_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(
            config.database.unwrap().url,
            "postgresql://test@localhost/test"
        );
        assert_eq!(config.redis.unwrap().url, "redis://localhost:6379");
    }

    #[test]
    fn test_minimal_config_runs_in_memory() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert!(config.database.is_none());
        assert!(config.redis.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_full_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_ok());
    }

    #[test]
    fn test_nested_recommendation_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("OPPORTUNITY_MATCHER__RECOMMENDATION__TOP_N", "10");
        env::set_var("OPPORTUNITY_MATCHER__RECOMMENDATION__NEIGHBORS__K", "7");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.recommendation.top_n, 10);
        assert_eq!(config.recommendation.neighbors.k, 7);
        assert_eq!(config.recommendation.min_score_threshold, 0.30);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("OPPORTUNITY_MATCHER__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("OPPORTUNITY_MATCHER__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(result.unwrap().server.port, 3000);
    }

    #[test]
    fn test_invalid_database_url_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("OPPORTUNITY_MATCHER__DATABASE__URL", "mysql://nope");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_err());
    }
}
