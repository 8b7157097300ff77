//! Monetary amounts.
//!
//! An [`Amount`] is an arbitrary-precision decimal that serializes as a JSON
//! string (`"10.00"`), never as a number: amounts encoded as JSON numbers are
//! rejected at decode time so no float ever enters the pipeline. Quantization
//! to the configured number of decimal places uses banker's rounding
//! (midpoint-nearest-even). Fold arithmetic is checked and bounded by a
//! significant-digit ceiling; exceeding it indicates a schema or
//! configuration fault, not a recoverable condition.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a string is not a parseable decimal.
#[derive(Debug, Clone, Error)]
#[error("invalid decimal amount: {preview}")]
pub struct ParseAmountError {
    preview: String,
}

/// Errors from checked balance arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    /// The operation overflowed the decimal representation.
    #[error("decimal overflow")]
    Overflow,

    /// The result carries more significant digits than the configured ceiling.
    #[error("result has {digits} significant digits, max is {max}")]
    PrecisionExceeded { digits: u32, max: u32 },
}

/// An arbitrary-precision decimal money amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Builds an amount from a scaled integer, e.g. `Amount::new(1, 2)` is `0.01`.
    pub fn new(num: i64, scale: u32) -> Self {
        Amount(Decimal::new(num, scale))
    }

    /// Parses a decimal string, accepting plain (`"1.009"`) and scientific
    /// (`"1e-2"`) notation.
    pub fn parse(s: &str) -> Result<Self, ParseAmountError> {
        let trimmed = s.trim();
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Amount)
            .map_err(|_| ParseAmountError {
                preview: s.chars().take(40).collect(),
            })
    }

    /// Rounds to `places` fractional digits (banker's rounding) and pads with
    /// trailing zeros, so `1` quantized to two places renders as `1.00`.
    pub fn quantize(self, places: u32) -> Amount {
        let mut d = self
            .0
            .round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven);
        d.rescale(places);
        Amount(d)
    }

    /// Number of significant digits in the amount's coefficient.
    pub fn significant_digits(&self) -> u32 {
        let mantissa = self.0.mantissa().unsigned_abs();
        if mantissa == 0 {
            return 1;
        }
        mantissa.ilog10() + 1
    }

    /// Checked addition bounded by a significant-digit ceiling.
    pub fn checked_add(self, rhs: Amount, max_digits: u32) -> Result<Amount, ArithmeticError> {
        let sum = self.0.checked_add(rhs.0).ok_or(ArithmeticError::Overflow)?;
        Amount(sum).bounded(max_digits)
    }

    /// Checked subtraction bounded by a significant-digit ceiling.
    pub fn checked_sub(self, rhs: Amount, max_digits: u32) -> Result<Amount, ArithmeticError> {
        let diff = self.0.checked_sub(rhs.0).ok_or(ArithmeticError::Overflow)?;
        Amount(diff).bounded(max_digits)
    }

    fn bounded(self, max_digits: u32) -> Result<Amount, ArithmeticError> {
        let digits = self.significant_digits();
        if digits > max_digits {
            return Err(ArithmeticError::PrecisionExceeded {
                digits,
                max: max_digits,
            });
        }
        Ok(self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // String-only on purpose: a JSON number here means a client is
        // sending floats for money.
        let s = String::deserialize(deserializer)?;
        Amount::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_plain_and_scientific() {
        assert_eq!(Amount::parse("10").unwrap(), Amount::new(10, 0));
        assert_eq!(Amount::parse("1.009").unwrap(), Amount::new(1009, 3));
        assert_eq!(Amount::parse("1e-2").unwrap(), Amount::new(1, 2));
        assert_eq!(Amount::parse("-0.01").unwrap(), Amount::new(-1, 2));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Amount::parse("").is_err());
        assert!(Amount::parse("ten").is_err());
        assert!(Amount::parse("1.0.0").is_err());
    }

    // ─── Quantization ───

    #[test]
    fn quantize_rounds_up() {
        assert_eq!(Amount::parse("1.009").unwrap().quantize(2).to_string(), "1.01");
    }

    #[test]
    fn quantize_rounds_down() {
        assert_eq!(Amount::parse("1.001").unwrap().quantize(2).to_string(), "1.00");
    }

    #[test]
    fn quantize_pads_trailing_zeros() {
        assert_eq!(Amount::parse("10").unwrap().quantize(2).to_string(), "10.00");
        assert_eq!(Amount::parse("1.5").unwrap().quantize(2).to_string(), "1.50");
    }

    #[test]
    fn quantize_is_half_even_at_midpoint() {
        assert_eq!(Amount::parse("0.125").unwrap().quantize(2).to_string(), "0.12");
        assert_eq!(Amount::parse("0.135").unwrap().quantize(2).to_string(), "0.14");
    }

    // ─── Checked arithmetic ───

    #[test]
    fn fold_keeps_two_place_scale() {
        let bal = Amount::ZERO
            .checked_sub(Amount::parse("10.00").unwrap(), 28)
            .unwrap();
        assert_eq!(bal.to_string(), "-10.00");

        let bal = bal.checked_add(Amount::parse("2.50").unwrap(), 28).unwrap();
        assert_eq!(bal.to_string(), "-7.50");
    }

    #[test]
    fn precision_ceiling_is_enforced() {
        let big = Amount::parse("12345.67").unwrap();
        let err = big
            .checked_add(Amount::parse("1.00").unwrap(), 5)
            .unwrap_err();
        assert!(matches!(err, ArithmeticError::PrecisionExceeded { .. }));
    }

    #[test]
    fn significant_digits_of_zero_is_one() {
        assert_eq!(Amount::ZERO.significant_digits(), 1);
    }

    // ─── Serde ───

    #[test]
    fn serializes_as_string() {
        let amt = Amount::parse("1.01").unwrap();
        assert_eq!(serde_json::to_string(&amt).unwrap(), "\"1.01\"");
    }

    #[test]
    fn rejects_json_numbers() {
        assert!(serde_json::from_str::<Amount>("1").is_err());
        assert!(serde_json::from_str::<Amount>("1.0").is_err());
    }

    #[test]
    fn accepts_json_strings() {
        let amt: Amount = serde_json::from_str("\"0.01\"").unwrap();
        assert_eq!(amt, Amount::new(1, 2));
    }

    proptest! {
        /// Quantization is idempotent.
        #[test]
        fn quantize_idempotent(cents in -1_000_000_000i64..1_000_000_000) {
            let amt = Amount::new(cents, 2);
            prop_assert_eq!(amt.quantize(2), amt.quantize(2).quantize(2));
        }

        /// Display/parse roundtrip preserves two-place amounts.
        #[test]
        fn display_parse_roundtrip(cents in -1_000_000_000i64..1_000_000_000) {
            let amt = Amount::new(cents, 2);
            let back = Amount::parse(&amt.to_string()).unwrap();
            prop_assert_eq!(back, amt);
        }

        /// Subtracting what was added restores the original balance.
        #[test]
        fn add_then_sub_is_identity(
            start in -1_000_000i64..1_000_000,
            delta in 0i64..1_000_000,
        ) {
            let bal = Amount::new(start, 2);
            let amt = Amount::new(delta, 2);
            let folded = bal
                .checked_add(amt, 28)
                .unwrap()
                .checked_sub(amt, 28)
                .unwrap();
            prop_assert_eq!(folded, bal);
        }
    }
}
