//! Outbox persistence primitives
//!
//! Rows are created in the same unit of work as their transaction, then
//! claimed, advanced, and retired only by the relay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::{OutboxEvent, OutboxStatus};

use super::StoreError;

type OutboxRow = (
    Uuid,
    String,
    serde_json::Value,
    String,
    i32,
    Option<Uuid>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

fn from_row(
    (id, topic, payload, status, attempts, lease_owner, lease_expires_at, created_at): OutboxRow,
) -> OutboxEvent {
    OutboxEvent {
        id,
        topic,
        payload,
        status: OutboxStatus::from(status),
        attempts,
        lease_owner,
        lease_expires_at,
        created_at,
    }
}

/// Insert a pending outbox event. Must be called inside the unit of work
/// that creates the transaction it references.
pub async fn create_event(
    conn: &mut PgConnection,
    topic: &str,
    payload: &serde_json::Value,
) -> Result<OutboxEvent, StoreError> {
    let row: OutboxRow = sqlx::query_as(
        r#"
        INSERT INTO outbox_events (id, topic, payload, status)
        VALUES ($1, $2, $3, $4)
        RETURNING id, topic, payload, status, attempts, lease_owner, lease_expires_at, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(topic)
    .bind(payload)
    .bind(OutboxStatus::Pending.to_string())
    .fetch_one(conn)
    .await?;

    Ok(from_row(row))
}

/// Atomically claim a batch of due rows: PENDING, or PROCESSING with an
/// expired lease, and still under the attempt ceiling. Claimed rows move to
/// PROCESSING with a fresh lease and an incremented attempt counter.
/// `FOR UPDATE SKIP LOCKED` guarantees at most one claimant per row across
/// concurrent workers.
pub async fn claim_batch(
    conn: &mut PgConnection,
    limit: i64,
    lease_duration: Duration,
    lease_owner: Uuid,
    max_attempts: i32,
) -> Result<Vec<OutboxEvent>, StoreError> {
    let rows: Vec<OutboxRow> = sqlx::query_as(
        r#"
        UPDATE outbox_events
        SET status = $1,
            lease_owner = $2,
            lease_expires_at = NOW() + make_interval(secs => $3),
            attempts = attempts + 1
        WHERE id IN (
            SELECT id FROM outbox_events
            WHERE (status = $4 OR (status = $1 AND lease_expires_at < NOW()))
              AND attempts < $5
            ORDER BY created_at
            LIMIT $6
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, topic, payload, status, attempts, lease_owner, lease_expires_at, created_at
        "#,
    )
    .bind(OutboxStatus::Processing.to_string())
    .bind(lease_owner)
    .bind(lease_duration.as_secs_f64())
    .bind(OutboxStatus::Pending.to_string())
    .bind(max_attempts)
    .bind(limit)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(from_row).collect())
}

/// Retire a claimed row after its effect has been committed (or absorbed as
/// a duplicate).
pub async fn mark_processed(conn: &mut PgConnection, id: Uuid) -> Result<bool, StoreError> {
    let rows = sqlx::query(
        r#"
        UPDATE outbox_events
        SET status = $2, lease_owner = NULL, lease_expires_at = NULL
        WHERE id = $1 AND status = $3
        "#,
    )
    .bind(id)
    .bind(OutboxStatus::Processed.to_string())
    .bind(OutboxStatus::Processing.to_string())
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows == 1)
}

/// Dead-letter a row permanently. Excluded from all future claims and
/// surfaced for operator remediation.
pub async fn mark_failed(conn: &mut PgConnection, id: Uuid) -> Result<bool, StoreError> {
    let rows = sqlx::query(
        r#"
        UPDATE outbox_events
        SET status = $2, lease_owner = NULL, lease_expires_at = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(OutboxStatus::Failed.to_string())
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows == 1)
}

/// Dead-letter every expired row that has exhausted its attempts. Claims
/// only select rows under the ceiling, so anything caught here has been
/// delivered `max_attempts` times without reaching a terminal outcome.
pub async fn dead_letter_exhausted(
    conn: &mut PgConnection,
    max_attempts: i32,
) -> Result<u64, StoreError> {
    let rows = sqlx::query(
        r#"
        UPDATE outbox_events
        SET status = $1, lease_owner = NULL, lease_expires_at = NULL
        WHERE status = $2 AND lease_expires_at < NOW() AND attempts >= $3
        "#,
    )
    .bind(OutboxStatus::Failed.to_string())
    .bind(OutboxStatus::Processing.to_string())
    .bind(max_attempts)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(rows)
}
