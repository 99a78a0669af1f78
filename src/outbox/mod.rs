//! Outbox relay
//!
//! Drains outbox rows and realizes their effect: at-least-once delivery,
//! exactly-once ledger impact.

pub mod payload;
mod relay;

pub use relay::{OutboxRelay, RelayConfig};
