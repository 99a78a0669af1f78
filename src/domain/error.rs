//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

/// Business rule violations and domain invariant failures.
/// Independent of the database layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid amount (zero, negative, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Sender and receiver resolve to the same wallet
    #[error("Cannot transfer to the same wallet")]
    SameWalletTransfer,

    /// Insufficient balance for debit, discovered at apply time
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    /// User has no wallet
    #[error("No wallet for user: {0}")]
    WalletNotFound(Uuid),
}

impl DomainError {
    pub fn insufficient_balance(
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    ) -> Self {
        Self::InsufficientBalance { required, available }
    }

    /// True for failures of the request itself, rejected before any write
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidAmount(_) | Self::SameWalletTransfer)
    }

    /// True when a referenced user or wallet does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UserNotFound(_) | Self::WalletNotFound(_))
    }
}
