//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Number of concurrent relay workers
    pub relay_workers: usize,

    /// Interval between outbox polls
    pub outbox_poll_interval: Duration,

    /// Maximum rows claimed per poll
    pub outbox_batch_size: i64,

    /// How long a claimed row stays leased before it becomes reclaimable
    pub outbox_lease_duration: Duration,

    /// Delivery attempts before a row is dead-lettered
    pub outbox_max_attempts: i32,

    /// Interval between dead-letter sweeps
    pub outbox_sweep_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let relay_workers = env::var("RELAY_WORKERS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("RELAY_WORKERS"))?;

        let poll_ms: u64 = env::var("OUTBOX_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_POLL_INTERVAL_MS"))?;

        let outbox_batch_size = env::var("OUTBOX_BATCH_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_BATCH_SIZE"))?;

        let lease_secs: u64 = env::var("OUTBOX_LEASE_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_LEASE_SECONDS"))?;

        let outbox_max_attempts = env::var("OUTBOX_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_MAX_ATTEMPTS"))?;

        let sweep_ms: u64 = env::var("OUTBOX_SWEEP_INTERVAL_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_SWEEP_INTERVAL_MS"))?;

        Ok(Self {
            database_url,
            database_max_connections,
            relay_workers,
            outbox_poll_interval: Duration::from_millis(poll_ms),
            outbox_batch_size,
            outbox_lease_duration: Duration::from_secs(lease_secs),
            outbox_max_attempts,
            outbox_sweep_interval: Duration::from_millis(sweep_ms),
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnv("DATABASE_URL");
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = ConfigError::InvalidValue("OUTBOX_BATCH_SIZE");
        assert!(err.to_string().contains("OUTBOX_BATCH_SIZE"));
    }
}
