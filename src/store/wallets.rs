//! Wallet persistence primitives
//!
//! Balance mutation happens only through [`apply_transfer`], inside a unit
//! of work that holds both row locks via [`lock_pair`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::Wallet;

use super::StoreError;

type WalletRow = (Uuid, Uuid, Decimal, String, DateTime<Utc>, DateTime<Utc>);

fn from_row((id, user_id, balance, currency, created_at, updated_at): WalletRow) -> Wallet {
    Wallet {
        id,
        user_id,
        balance,
        currency,
        created_at,
        updated_at,
    }
}

pub async fn create(
    conn: &mut PgConnection,
    user_id: Uuid,
    currency: &str,
) -> Result<Wallet, StoreError> {
    let row: WalletRow = sqlx::query_as(
        r#"
        INSERT INTO wallets (id, user_id, currency)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, balance, currency, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(currency)
    .fetch_one(conn)
    .await?;

    Ok(from_row(row))
}

pub async fn get_by_user_id(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<Wallet>, StoreError> {
    let row: Option<WalletRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, balance, currency, created_at, updated_at
        FROM wallets
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(from_row))
}

/// Read a wallet by user id, locking the row until the unit of work ends.
pub async fn get_by_user_id_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<Wallet>, StoreError> {
    let row: Option<WalletRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, balance, currency, created_at, updated_at
        FROM wallets
        WHERE user_id = $1
        FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(from_row))
}

async fn get_by_id_for_update(
    conn: &mut PgConnection,
    wallet_id: Uuid,
) -> Result<Option<Wallet>, StoreError> {
    let row: Option<WalletRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, balance, currency, created_at, updated_at
        FROM wallets
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(wallet_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(from_row))
}

/// Ascending lock order for a wallet pair. Every code path that locks two
/// wallets must go through this ordering or risk deadlock with a transfer
/// running in the opposite direction.
pub(crate) fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Lock both wallets of a transfer FOR UPDATE, acquiring in ascending
/// wallet-id order. Returns them as (first, second) matching the argument
/// order.
pub async fn lock_pair(
    conn: &mut PgConnection,
    first_id: Uuid,
    second_id: Uuid,
) -> Result<Option<(Wallet, Wallet)>, StoreError> {
    let (lo, hi) = ordered_pair(first_id, second_id);

    let lo_wallet = get_by_id_for_update(conn, lo).await?;
    let hi_wallet = get_by_id_for_update(conn, hi).await?;

    let (Some(lo_wallet), Some(hi_wallet)) = (lo_wallet, hi_wallet) else {
        return Ok(None);
    };

    if lo_wallet.id == first_id {
        Ok(Some((lo_wallet, hi_wallet)))
    } else {
        Ok(Some((hi_wallet, lo_wallet)))
    }
}

/// Debit the sender and credit the receiver. Callers must hold both row
/// locks (via [`lock_pair`]) and have verified sufficiency; the balance
/// CHECK constraint is the last line of defense.
pub async fn apply_transfer(
    conn: &mut PgConnection,
    sender_wallet_id: Uuid,
    receiver_wallet_id: Uuid,
    amount: Decimal,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE wallets
        SET balance = balance - $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(sender_wallet_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE wallets
        SET balance = balance + $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(receiver_wallet_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
