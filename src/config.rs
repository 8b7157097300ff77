//! Pipeline configuration.
//!
//! The original service wired these through a builder of option functions;
//! here they are a plain record with named defaults, passed explicitly to
//! constructors.

use crate::types::Amount;

/// Default topic where transfer requests are published.
pub const DEFAULT_TRANSFER_TOPIC: &str = "wallet.transfer_request";
/// Default topic where payments are published.
pub const DEFAULT_PAYMENT_TOPIC: &str = "wallet.payment";

/// Maximum significant digits carried by balance arithmetic.
pub const DECIMAL_MAX_DIGITS: u32 = 28;
/// Fractional digits amounts are quantized to.
pub const DECIMAL_PLACES: u32 = 2;

/// Settings shared by every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Topic carrying transfer requests, keyed by request id.
    pub transfer_topic: String,

    /// Topic carrying payments, keyed by account.
    pub payment_topic: String,

    /// Significant-digit ceiling for balance arithmetic.
    pub decimal_max_digits: u32,

    /// Fractional digits amounts are quantized to at the ingress.
    pub decimal_places: u32,

    /// Smallest accepted transfer amount.
    pub min_amount: Amount,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            transfer_topic: DEFAULT_TRANSFER_TOPIC.to_string(),
            payment_topic: DEFAULT_PAYMENT_TOPIC.to_string(),
            decimal_max_digits: DECIMAL_MAX_DIGITS,
            decimal_places: DECIMAL_PLACES,
            min_amount: Amount::new(1, 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.transfer_topic, "wallet.transfer_request");
        assert_eq!(cfg.payment_topic, "wallet.payment");
        assert_eq!(cfg.min_amount.to_string(), "0.01");
    }
}
