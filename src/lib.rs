//! wallet_ledger Library
//!
//! Wallet ledger with a transactional outbox: transfers are recorded as
//! PENDING transactions together with an outbox event in one database
//! transaction, and a relay worker applies the balance mutation exactly once.

pub mod config;
pub mod db;
pub mod domain;
pub mod outbox;
pub mod store;
pub mod transfer;

mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{Amount, AmountError, Balance, DomainError};
pub use domain::{OutboxEvent, OutboxStatus, Transaction, TransactionStatus, User, Wallet};
