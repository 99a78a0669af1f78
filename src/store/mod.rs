//! Ledger Store
//!
//! Primitive persistence operations grouped per entity family, plus the
//! unit-of-work executor. Every primitive takes a `&mut PgConnection`, so it
//! runs the same inside a unit of work or against a pooled connection.

use std::future::Future;
use std::pin::Pin;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

pub mod outbox;
pub mod transactions;
pub mod users;
pub mod wallets;

/// Store-layer errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    #[error("Refusing non-terminal transaction status: {0}")]
    NonTerminalStatus(String),
}

impl StoreError {
    /// Transient infrastructure failures; the caller may retry after the
    /// unit of work rolls back.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Database(_))
    }
}

/// One atomic transaction. All writes performed through [`UnitOfWork::conn`]
/// commit together or not at all; dropping the unit of work without a commit
/// rolls everything back.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    /// Connection handle bound to this transaction, accepted by every store
    /// primitive.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

/// Boxed future returned by unit-of-work closures.
pub type UowFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Concrete Postgres-backed store, bound at process start and shared by the
/// orchestrator and the relay.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: PgPool,
}

impl LedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a unit of work explicitly. Prefer [`LedgerStore::execute`];
    /// this exists for callers that need to interleave their own control
    /// flow with the transaction boundary.
    pub async fn begin(&self) -> Result<UnitOfWork, sqlx::Error> {
        Ok(UnitOfWork {
            tx: self.pool.begin().await?,
        })
    }

    /// Run `op` inside one atomic transaction: commit on `Ok`, roll back on
    /// `Err`. No nesting; composite behavior belongs in a single closure.
    pub async fn execute<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: From<sqlx::Error> + Send,
        F: for<'u> FnOnce(&'u mut UnitOfWork) -> UowFuture<'u, T, E>,
    {
        let mut uow = self.begin().await?;

        match op(&mut uow).await {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rb_err) = uow.rollback().await {
                    tracing::error!(error = %rb_err, "rollback failed after aborted unit of work");
                }
                Err(err)
            }
        }
    }
}
