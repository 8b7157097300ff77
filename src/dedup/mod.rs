//! Durable request-id deduplication.
//!
//! The accountant consults this index before every balance effect, so the
//! contract is strict: once `put` returns, any later `has` on the same
//! storage returns true, across process crashes and host restarts. The index
//! only ever grows; it is a rebuildable acceleration structure (replaying the
//! payment log from offset zero reconstructs it), but while it exists it IS
//! the effect-space commit cursor.
//!
//! Any read or write error is fatal to the accountant: "dedup before side
//! effect" cannot be preserved over an unreliable index.

pub mod store;

use thiserror::Error;

use crate::types::RequestId;

pub use store::DedupStore;

/// Errors from the dedup index.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The underlying store failed.
    #[error("dedup store error: {0}")]
    Store(#[from] sled::Error),
}

/// A durable set of request ids that have already produced a balance effect.
pub trait DedupIndex {
    /// True iff a prior [`DedupIndex::put`] for this id completed.
    ///
    /// Read-only; safe to call concurrently with `put`.
    fn has(&self, request_id: &RequestId) -> Result<bool, DedupError>;

    /// Records the id. Idempotent; on return the write is durable.
    fn put(&mut self, request_id: &RequestId) -> Result<(), DedupError>;
}
