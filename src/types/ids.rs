//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of identifiers (e.g., using an
//! account where a request id is expected) and centralize the normalization
//! rules: request ids render in canonical lowercase hyphenated UUID form,
//! account identifiers are trimmed and non-empty.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when parsing an invalid request id.
#[derive(Debug, Clone, Error)]
#[error("request id is not a valid UUID: {preview}")]
pub struct InvalidRequestId {
    preview: String,
}

/// Error returned when parsing an invalid account identifier.
#[derive(Debug, Clone, Error)]
#[error("account identifier is empty")]
pub struct InvalidAccount;

/// A UUID uniquely identifying a money-transfer intent.
///
/// The two payments (incoming and outgoing) derived from a transfer share its
/// request id; the accountant deduplicates on it. Serializes in canonical
/// lowercase hyphenated form regardless of the input spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Parses a request id, accepting hyphenated, un-hyphenated, and
    /// mixed-case UUID spellings.
    pub fn parse(s: &str) -> Result<Self, InvalidRequestId> {
        Uuid::parse_str(s.trim())
            .map(RequestId)
            .map_err(|_| InvalidRequestId {
                preview: s.chars().take(40).collect(),
            })
    }

    /// Returns the canonical lowercase hyphenated rendering.
    pub fn to_canonical(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for RequestId {
    fn from(u: Uuid) -> Self {
        RequestId(u)
    }
}

/// An account identifier.
///
/// Guaranteed non-empty with no surrounding whitespace; construction goes
/// through [`AccountId::parse`]. Used verbatim as the payment partition key,
/// so equal accounts always land on the same partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Trims surrounding whitespace and rejects empty identifiers.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidAccount> {
        let s = s.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InvalidAccount);
        }
        Ok(AccountId(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        AccountId::parse(s).map_err(serde::de::Error::custom)
    }
}
