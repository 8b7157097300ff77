//! Money-transfer requests.

use serde::{Deserialize, Serialize};

use super::{AccountId, Amount, RequestId};

/// A money-transfer request as it travels on the transfer topic.
///
/// Created by the HTTP ingress, published keyed by its id, and immutable from
/// then on. `partition` and `sequence_id` are stamped by consumers from the
/// log envelope; producers leave them zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// Request id shared by the payment pair derived from this transfer.
    #[serde(rename = "request_id")]
    pub id: RequestId,

    /// Sender account (debited).
    pub from: AccountId,

    /// Recipient account (credited).
    pub to: AccountId,

    /// Transfer amount, quantized by the ingress.
    pub amount: Amount,

    /// Partition the record was read from.
    #[serde(default)]
    pub partition: i32,

    /// Offset of the record within its partition.
    #[serde(default)]
    pub sequence_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transfer {
        Transfer {
            id: RequestId::parse("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11").unwrap(),
            from: AccountId::parse("Alice").unwrap(),
            to: AccountId::parse("Bob").unwrap(),
            amount: Amount::parse("10.00").unwrap(),
            partition: 0,
            sequence_id: 0,
        }
    }

    #[test]
    fn wire_shape_matches_contract() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "request_id": "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11",
                "from": "Alice",
                "to": "Bob",
                "amount": "10.00",
                "partition": 0,
                "sequence_id": 0,
            })
        );
    }

    #[test]
    fn decodes_without_log_fields() {
        let t: Transfer = serde_json::from_str(
            r#"{"request_id":"a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11",
                "from":"Alice","to":"Bob","amount":"1.00"}"#,
        )
        .unwrap();
        assert_eq!(t.partition, 0);
        assert_eq!(t.sequence_id, 0);
    }
}
