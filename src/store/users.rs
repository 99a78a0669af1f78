//! User persistence primitives
//!
//! Users are owned by the auth collaborator; the store only persists the
//! identity row that wallets reference.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::User;

use super::StoreError;

type UserRow = (Uuid, String, String, DateTime<Utc>, DateTime<Utc>);

fn from_row((id, email, password_hash, created_at, updated_at): UserRow) -> User {
    User {
        id,
        email,
        password_hash,
        created_at,
        updated_at,
    }
}

pub async fn create(
    conn: &mut PgConnection,
    email: &str,
    password_hash: &str,
) -> Result<User, StoreError> {
    let row: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id, email, password_hash, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .fetch_one(conn)
    .await?;

    Ok(from_row(row))
}

pub async fn get_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<User>, StoreError> {
    let row: Option<UserRow> = sqlx::query_as(
        r#"
        SELECT id, email, password_hash, created_at, updated_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(from_row))
}
