//! Directional payments derived from transfers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AccountId, Amount, RequestId};

/// Which way a payment moves money for its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Debits the account.
    Outgoing,
    /// Credits the account.
    Incoming,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outgoing => write!(f, "outgoing"),
            Direction::Incoming => write!(f, "incoming"),
        }
    }
}

/// One half of a payment pair on the payment topic.
///
/// Emitted by the expander keyed by `account`, so every payment touching a
/// given account lands on the same partition. The `(request_id, direction)`
/// pair is unique in the intended data; replays may re-emit the same logical
/// payment, which the accountant's dedup index absorbs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Id of the originating transfer, identical on both halves of the pair.
    pub request_id: RequestId,

    /// Account this payment debits or credits.
    pub account: AccountId,

    /// Payment direction.
    pub direction: Direction,

    /// Payment amount, equal to the transfer amount.
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

    #[test]
    fn wire_shape_matches_contract() {
        let p = Payment {
            request_id: RequestId::parse("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11").unwrap(),
            account: AccountId::parse("Alice").unwrap(),
            direction: Direction::Outgoing,
            amount: Amount::parse("10.00").unwrap(),
            partition: 3,
            sequence_id: 42,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "request_id": "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11",
                "account": "Alice",
                "direction": "outgoing",
                "amount": "10.00",
                "partition": 3,
                "sequence_id": 42,
            })
        );
    }

    #[test]
    fn direction_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&Direction::Incoming).unwrap(),
            "\"incoming\""
        );
        let d: Direction = serde_json::from_str("\"outgoing\"").unwrap();
        assert_eq!(d, Direction::Outgoing);
    }
}
