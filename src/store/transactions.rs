//! Transaction persistence primitives

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus};

use super::StoreError;

type TransactionRow = (
    Uuid,
    Uuid,
    Uuid,
    Decimal,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn from_row(
    (id, sender_wallet_id, receiver_wallet_id, amount, status, created_at, updated_at): TransactionRow,
) -> Transaction {
    Transaction {
        id,
        sender_wallet_id,
        receiver_wallet_id,
        amount,
        status: TransactionStatus::from(status),
        created_at,
        updated_at,
    }
}

/// Insert a new transfer intent with status PENDING.
pub async fn create(
    conn: &mut PgConnection,
    sender_wallet_id: Uuid,
    receiver_wallet_id: Uuid,
    amount: Decimal,
) -> Result<Transaction, StoreError> {
    let row: TransactionRow = sqlx::query_as(
        r#"
        INSERT INTO transactions (id, sender_wallet_id, receiver_wallet_id, amount, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, sender_wallet_id, receiver_wallet_id, amount, status, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(sender_wallet_id)
    .bind(receiver_wallet_id)
    .bind(amount)
    .bind(TransactionStatus::Pending.to_string())
    .fetch_one(conn)
    .await?;

    Ok(from_row(row))
}

pub async fn get(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<Transaction>, StoreError> {
    let row: Option<TransactionRow> = sqlx::query_as(
        r#"
        SELECT id, sender_wallet_id, receiver_wallet_id, amount, status, created_at, updated_at
        FROM transactions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(from_row))
}

/// Read a transaction, locking the row until the unit of work ends. The
/// relay holds this lock across the terminal-state check and the balance
/// mutation so duplicate deliveries serialize on it.
pub async fn get_for_update(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<Transaction>, StoreError> {
    let row: Option<TransactionRow> = sqlx::query_as(
        r#"
        SELECT id, sender_wallet_id, receiver_wallet_id, amount, status, created_at, updated_at
        FROM transactions
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(from_row))
}

/// Move a PENDING transaction to a terminal status. The update is
/// conditional on the row still being PENDING, so terminal states are never
/// revisited; returns false if the row had already been finalized.
pub async fn update_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: TransactionStatus,
) -> Result<bool, StoreError> {
    if !status.is_terminal() {
        return Err(StoreError::NonTerminalStatus(status.to_string()));
    }

    let rows = sqlx::query(
        r#"
        UPDATE transactions
        SET status = $2, updated_at = NOW()
        WHERE id = $1 AND status = $3
        "#,
    )
    .bind(id)
    .bind(status.to_string())
    .bind(TransactionStatus::Pending.to_string())
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows == 1)
}
