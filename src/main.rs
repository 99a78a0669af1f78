//! wallet-relay - Outbox relay worker for the wallet ledger
//!
//! Drains the transactional outbox and applies transfer effects to wallet
//! balances, exactly once per transfer.

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_ledger::outbox::{OutboxRelay, RelayConfig};
use wallet_ledger::store::LedgerStore;
use wallet_ledger::{db, Config};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting wallet-relay worker");
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let store = LedgerStore::new(pool.clone());
    let relay_config = RelayConfig::from_app_config(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = Vec::with_capacity(config.relay_workers);
    for _ in 0..config.relay_workers {
        let relay = OutboxRelay::new(store.clone(), relay_config.clone(), shutdown_rx.clone());
        workers.push(relay.start());
    }

    tracing::info!(workers = config.relay_workers, "Relay workers running");

    shutdown_signal().await;

    // Workers finish their current row, never stopping mid-apply
    shutdown_tx.send(true).ok();
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "relay worker terminated abnormally");
        }
    }

    tracing::info!("Relay workers stopped, closing database connections...");
    pool.close().await;
    tracing::info!("Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
