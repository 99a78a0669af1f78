//! Outbox Relay Worker
//!
//! Long-lived worker that claims due outbox rows under a lease, applies the
//! transfer each row references in its own unit of work, and retires the
//! row. Multiple relays may run concurrently; the conditional claim update
//! guarantees per-row mutual exclusion.

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{OutboxEvent, TransactionStatus};
use crate::store::{outbox, transactions, wallets, LedgerStore, StoreError, UnitOfWork};

use super::payload::ProcessTransferPayload;

/// Configuration for the relay loop
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Interval between outbox polls
    pub poll_interval: Duration,
    /// Maximum rows claimed per poll
    pub batch_size: i64,
    /// How long a claim stays exclusive before another worker may reclaim it
    pub lease_duration: Duration,
    /// Delivery attempts before a row is dead-lettered
    pub max_attempts: i32,
    /// Interval between dead-letter sweeps
    pub sweep_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 10,
            lease_duration: Duration::from_secs(30),
            max_attempts: 5,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl RelayConfig {
    pub fn from_app_config(config: &Config) -> Self {
        Self {
            poll_interval: config.outbox_poll_interval,
            batch_size: config.outbox_batch_size,
            lease_duration: config.outbox_lease_duration,
            max_attempts: config.outbox_max_attempts,
            sweep_interval: config.outbox_sweep_interval,
        }
    }
}

/// Result of applying one outbox row inside its unit of work
#[derive(Debug)]
enum ApplyOutcome {
    /// Balances mutated, transaction COMPLETED
    Applied,
    /// Sender could not cover the amount, transaction FAILED
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },
    /// Transaction already terminal: duplicate delivery, no mutation
    Duplicate,
    /// Referenced transaction or wallet row does not exist
    Missing,
}

/// Outbox relay worker
pub struct OutboxRelay {
    store: LedgerStore,
    config: RelayConfig,
    worker_id: Uuid,
    shutdown: watch::Receiver<bool>,
}

impl OutboxRelay {
    pub fn new(store: LedgerStore, config: RelayConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            store,
            config,
            worker_id: Uuid::new_v4(),
            shutdown,
        }
    }

    /// Lease owner token carried on rows claimed by this worker
    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// Start the relay loop in the background
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        tracing::info!(worker_id = %self.worker_id, "outbox relay started");

        let mut poll = interval(self.config.poll_interval);
        let mut sweep = interval(self.config.sweep_interval);
        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    match self.drain_once().await {
                        Ok(0) => {}
                        Ok(rows) => {
                            tracing::debug!(worker_id = %self.worker_id, rows = rows, "drained outbox batch");
                        }
                        Err(e) => {
                            tracing::error!(worker_id = %self.worker_id, error = %e, "outbox drain failed");
                        }
                    }
                }
                _ = sweep.tick() => {
                    if let Err(e) = self.dead_letter_sweep().await {
                        tracing::error!(worker_id = %self.worker_id, error = %e, "dead-letter sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "outbox relay stopped");
    }

    /// Claim one batch of due rows and apply them. Returns the number of
    /// rows brought to a terminal outbox state. Rows whose apply failed
    /// transiently stay PROCESSING and become reclaimable on lease expiry.
    pub async fn drain_once(&self) -> Result<usize, StoreError> {
        let batch = {
            let mut conn = self.store.pool().acquire().await?;
            outbox::claim_batch(
                &mut conn,
                self.config.batch_size,
                self.config.lease_duration,
                self.worker_id,
                self.config.max_attempts,
            )
            .await?
        };

        let mut processed = 0;
        for event in &batch {
            // Cancellation between rows, never mid-row: an apply that has
            // begun runs to commit or rollback.
            if *self.shutdown.borrow() {
                tracing::info!(
                    worker_id = %self.worker_id,
                    remaining = batch.len() - processed,
                    "shutdown requested, leaving remaining rows to lease expiry"
                );
                break;
            }

            match self.process_event(event).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    tracing::warn!(
                        event_id = %event.id,
                        attempts = event.attempts,
                        error = %e,
                        "outbox apply failed, row stays leased until expiry"
                    );
                }
            }
        }

        Ok(processed)
    }

    /// Apply a single claimed row: decode, run the transfer in one unit of
    /// work, then retire the row.
    async fn process_event(&self, event: &OutboxEvent) -> Result<(), StoreError> {
        let payload: ProcessTransferPayload = match serde_json::from_value(event.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "undecodable outbox payload, dead-lettering");
                let mut conn = self.store.pool().acquire().await?;
                outbox::mark_failed(&mut conn, event.id).await?;
                return Ok(());
            }
        };

        let transaction_id = payload.transaction_id;

        let outcome = self
            .store
            .execute(move |uow| Box::pin(async move { apply_transfer(uow, transaction_id).await }))
            .await?;

        // The ledger effect is committed; retiring the outbox row is a
        // separate step. If the process dies here the row is re-delivered
        // and the terminal-state check absorbs it.
        let mut conn = self.store.pool().acquire().await?;
        match outcome {
            ApplyOutcome::Applied => {
                outbox::mark_processed(&mut conn, event.id).await?;
                tracing::info!(
                    event_id = %event.id,
                    transaction_id = %transaction_id,
                    "transfer applied"
                );
            }
            ApplyOutcome::InsufficientFunds {
                required,
                available,
            } => {
                outbox::mark_processed(&mut conn, event.id).await?;
                tracing::info!(
                    event_id = %event.id,
                    transaction_id = %transaction_id,
                    required = %required,
                    available = %available,
                    "insufficient funds, transaction failed"
                );
            }
            ApplyOutcome::Duplicate => {
                outbox::mark_processed(&mut conn, event.id).await?;
                tracing::debug!(
                    event_id = %event.id,
                    transaction_id = %transaction_id,
                    "duplicate delivery absorbed"
                );
            }
            ApplyOutcome::Missing => {
                outbox::mark_failed(&mut conn, event.id).await?;
                tracing::warn!(
                    event_id = %event.id,
                    transaction_id = %transaction_id,
                    "outbox event references missing rows, dead-lettering"
                );
            }
        }

        Ok(())
    }

    /// Dead-letter rows that exhausted their attempts without reaching a
    /// terminal outcome. They are excluded from claims and surfaced here.
    pub async fn dead_letter_sweep(&self) -> Result<u64, StoreError> {
        let mut conn = self.store.pool().acquire().await?;
        let rows = outbox::dead_letter_exhausted(&mut conn, self.config.max_attempts).await?;

        if rows > 0 {
            tracing::warn!(
                rows = rows,
                max_attempts = self.config.max_attempts,
                "dead-lettered exhausted outbox events"
            );
        }

        Ok(rows)
    }
}

/// The apply phase for one transfer, inside one unit of work. Locks the
/// transaction row first, then both wallets in ascending id order, so
/// duplicate deliveries and opposing transfers serialize without deadlock.
async fn apply_transfer(
    uow: &mut UnitOfWork,
    transaction_id: Uuid,
) -> Result<ApplyOutcome, StoreError> {
    let Some(tx) = transactions::get_for_update(uow.conn(), transaction_id).await? else {
        return Ok(ApplyOutcome::Missing);
    };

    // Idempotency guard: a terminal transaction means this delivery is a
    // duplicate and must not touch balances again.
    if tx.status.is_terminal() {
        return Ok(ApplyOutcome::Duplicate);
    }

    let Some((sender, receiver)) =
        wallets::lock_pair(uow.conn(), tx.sender_wallet_id, tx.receiver_wallet_id).await?
    else {
        return Ok(ApplyOutcome::Missing);
    };

    if sender.balance < tx.amount {
        transactions::update_status(uow.conn(), tx.id, TransactionStatus::Failed).await?;
        return Ok(ApplyOutcome::InsufficientFunds {
            required: tx.amount,
            available: sender.balance,
        });
    }

    wallets::apply_transfer(uow.conn(), sender.id, receiver.id, tx.amount).await?;
    transactions::update_status(uow.conn(), tx.id, TransactionStatus::Completed).await?;

    Ok(ApplyOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.lease_duration, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 5);
    }
}
