//! Transfer Orchestrator
//!
//! Validates and records a transfer intent together with its outbox
//! notification in one unit of work. Never moves money: the balance
//! mutation belongs to the outbox relay, so the synchronous path stays fast
//! and the notification survives a crash immediately after commit.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Amount, DomainError, Transaction, Wallet};
use crate::error::AppError;
use crate::outbox::payload::{ProcessTransferPayload, TRANSFER_PROCESS_TOPIC};
use crate::store::{outbox, transactions, wallets, LedgerStore, StoreError};

/// Caller-facing transfer and wallet operations.
#[derive(Debug, Clone)]
pub struct TransferService {
    store: LedgerStore,
}

impl TransferService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Record a transfer intent.
    ///
    /// Persists a PENDING transaction and its outbox event atomically and
    /// returns the PENDING transaction. The balance mutation is applied
    /// later by the relay; insufficient funds therefore never surface here,
    /// only as the transaction reaching FAILED.
    pub async fn create_transfer(
        &self,
        sender_user_id: Uuid,
        receiver_user_id: Uuid,
        amount: Decimal,
    ) -> Result<Transaction, AppError> {
        let amount = Amount::new(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

        if sender_user_id == receiver_user_id {
            return Err(DomainError::SameWalletTransfer.into());
        }

        let transaction = self
            .store
            .execute(move |uow| {
                Box::pin(async move {
                    let sender = wallets::get_by_user_id(uow.conn(), sender_user_id)
                        .await?
                        .ok_or(DomainError::WalletNotFound(sender_user_id))?;
                    let receiver = wallets::get_by_user_id(uow.conn(), receiver_user_id)
                        .await?
                        .ok_or(DomainError::WalletNotFound(receiver_user_id))?;

                    if sender.id == receiver.id {
                        return Err(DomainError::SameWalletTransfer.into());
                    }

                    let transaction = transactions::create(
                        uow.conn(),
                        sender.id,
                        receiver.id,
                        amount.value(),
                    )
                    .await?;

                    let payload = serde_json::to_value(ProcessTransferPayload {
                        transaction_id: transaction.id,
                    })
                    .map_err(StoreError::Serialization)?;

                    outbox::create_event(uow.conn(), TRANSFER_PROCESS_TOPIC, &payload).await?;

                    Ok::<_, AppError>(transaction)
                })
            })
            .await?;

        tracing::info!(
            transaction_id = %transaction.id,
            sender_user_id = %sender_user_id,
            receiver_user_id = %receiver_user_id,
            amount = %amount,
            "transfer recorded"
        );

        Ok(transaction)
    }

    /// Provision a wallet for a user. Called by the auth collaborator at
    /// signup time; one wallet per user is enforced by the unique
    /// constraint on user_id.
    pub async fn open_wallet(
        &self,
        user_id: Uuid,
        currency: &str,
    ) -> Result<Wallet, AppError> {
        let mut conn = self.store.pool().acquire().await?;
        let wallet = wallets::create(&mut conn, user_id, currency).await?;

        tracing::info!(wallet_id = %wallet.id, user_id = %user_id, "wallet opened");

        Ok(wallet)
    }

    /// Read a user's wallet, including the balance as last applied by the
    /// relay.
    pub async fn get_wallet(&self, user_id: Uuid) -> Result<Wallet, AppError> {
        let mut conn = self.store.pool().acquire().await?;

        wallets::get_by_user_id(&mut conn, user_id)
            .await?
            .ok_or_else(|| DomainError::WalletNotFound(user_id).into())
    }

    /// Inspect a transfer; callers observe FAILED or COMPLETED here once
    /// the relay has applied it.
    pub async fn get_transaction(&self, id: Uuid) -> Result<Transaction, AppError> {
        let mut conn = self.store.pool().acquire().await?;

        transactions::get(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::Store(StoreError::TransactionNotFound(id)))
    }
}
