//! Sled-backed dedup store.
//!
//! Keys are canonical request-id strings, values a single marker byte; the
//! set membership is what matters. `put` flushes before returning so the
//! durability contract (a completed `put` survives crash) holds.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::RequestId;

use super::{DedupError, DedupIndex};

/// Marker stored against every seen request id.
const SEEN: &[u8] = &[1];

/// An on-disk dedup index.
///
/// The accountant opens one store per process, at a per-partition path such
/// as `dedup0.db`; the database is created on first use.
pub struct DedupStore {
    db: sled::Db,
    path: PathBuf,
}

impl DedupStore {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DedupError> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)?;
        debug!(path = %path.display(), "dedup store opened");
        Ok(DedupStore { db, path })
    }

    /// Path the store was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of request ids recorded.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// True if no request id has been recorded.
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl DedupIndex for DedupStore {
    fn has(&self, request_id: &RequestId) -> Result<bool, DedupError> {
        let key = request_id.to_canonical();
        let found = self.db.get(key.as_bytes())?.is_some();
        debug!(request = %key, found, "dedup lookup");
        Ok(found)
    }

    fn put(&mut self, request_id: &RequestId) -> Result<(), DedupError> {
        let key = request_id.to_canonical();
        self.db.insert(key.as_bytes(), SEEN)?;
        // The insert alone is not crash-durable; the flush is the contract.
        self.db.flush()?;
        debug!(request = %key, "dedup saved");
        Ok(())
    }
}
