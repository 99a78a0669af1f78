//! Outbox message payloads
//!
//! The topic field namespaces message kinds so new kinds can be added
//! without a schema change.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic for transfer-processing messages
pub const TRANSFER_PROCESS_TOPIC: &str = "transfer.process";

/// Payload of a `transfer.process` message, stored as the outbox row's
/// opaque body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTransferPayload {
    pub transaction_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip() {
        let payload = ProcessTransferPayload {
            transaction_id: Uuid::new_v4(),
        };

        let value = serde_json::to_value(payload).unwrap();
        assert!(value.get("transaction_id").is_some());

        let decoded: ProcessTransferPayload = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let value = serde_json::json!({ "transaction_id": "not-a-uuid" });
        let decoded: Result<ProcessTransferPayload, _> = serde_json::from_value(value);
        assert!(decoded.is_err());
    }

    #[test]
    fn test_topic_constant() {
        assert_eq!(TRANSFER_PROCESS_TOPIC, "transfer.process");
    }
}
