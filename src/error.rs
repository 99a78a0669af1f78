//! Error handling module
//!
//! Centralized error type aggregating the domain, store, and config layers.

use crate::config::ConfigError;
use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Business rule violations and not-found lookups, rejected before any write
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Infrastructure failures; the in-flight unit of work is rolled back
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the caller may safely retry the operation: nothing was
    /// committed and the failure was infrastructural rather than semantic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Store(e) if e.is_retryable())
    }

    /// True when the request itself was invalid (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Domain(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(StoreError::Database(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_store_errors_are_retryable() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_domain_errors_are_client_errors() {
        let err = AppError::Domain(DomainError::SameWalletTransfer);
        assert!(err.is_client_error());
        assert!(!err.is_retryable());

        let err = AppError::Domain(DomainError::WalletNotFound(Uuid::nil()));
        assert!(err.is_client_error());
    }
}
