//! Common test utilities

use std::sync::OnceLock;

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use wallet_ledger::store::{users, wallets, LedgerStore};
use wallet_ledger::Wallet;

static DB_GATE: OnceLock<Mutex<()>> = OnceLock::new();

/// Serialize database-backed tests; every test truncates the shared tables.
pub async fn lock_db() -> MutexGuard<'static, ()> {
    DB_GATE.get_or_init(|| Mutex::new(())).lock().await
}

/// Connect to the test database and reset its state. Returns None when
/// DATABASE_URL is not configured so the suite can run without
/// infrastructure.
pub async fn try_setup() -> Option<PgPool> {
    dotenvy::dotenv().ok();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query("TRUNCATE TABLE outbox_events, transactions, wallets, users CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    Some(pool)
}

/// Create a user and a wallet holding `balance`.
pub async fn seed_user_with_wallet(
    store: &LedgerStore,
    email: &str,
    balance: Decimal,
) -> (Uuid, Wallet) {
    let mut conn = store.pool().acquire().await.expect("acquire connection");

    let user = users::create(&mut conn, email, "argon2id$seeded")
        .await
        .expect("Failed to seed user");
    let wallet = wallets::create(&mut conn, user.id, "USD")
        .await
        .expect("Failed to seed wallet");

    sqlx::query("UPDATE wallets SET balance = $2 WHERE id = $1")
        .bind(wallet.id)
        .bind(balance)
        .execute(store.pool())
        .await
        .expect("Failed to seed balance");

    (user.id, Wallet { balance, ..wallet })
}

/// Current balance of a wallet
pub async fn wallet_balance(pool: &PgPool, wallet_id: Uuid) -> Decimal {
    sqlx::query_scalar("SELECT balance FROM wallets WHERE id = $1")
        .bind(wallet_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read balance")
}

/// Status column of an outbox row
pub async fn outbox_status(pool: &PgPool, event_id: Uuid) -> String {
    sqlx::query_scalar("SELECT status FROM outbox_events WHERE id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read outbox status")
}
