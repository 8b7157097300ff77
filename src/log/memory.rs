//! In-process implementation of the log contract.
//!
//! Backed by per-partition append-only vectors, with the same observable
//! semantics as the broker: deterministic key-hash partition assignment,
//! total order within a partition, monotonically increasing offsets, and
//! tailing consumers that block until new records arrive or the cancellation
//! token fires. Used by the test suite and for running the pipeline without a
//! broker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use std::future::Future;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::types::{Payment, Transfer};

use super::{
    LogError, PaymentPublisher, PaymentStream, PublishAck, PublishError, RECORD_CHANNEL_CAPACITY,
    Record, RecordStream, StartOffset, TransferPublisher, TransferStream,
};

/// An in-process partitioned log holding the transfer and payment topics.
///
/// Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct MemoryLog {
    inner: Arc<Inner>,
}

struct Inner {
    partitions: i32,
    transfer_topic: String,
    payment_topic: String,
    topics: Mutex<HashMap<String, Vec<Vec<StoredRecord>>>>,
    // Bumped on every publish; tailing consumers wait on it.
    version: watch::Sender<u64>,
}

struct StoredRecord {
    value: Vec<u8>,
}

impl MemoryLog {
    /// Creates a log where every topic has `partitions` partitions.
    ///
    /// # Panics
    ///
    /// Panics if `partitions` is not positive.
    pub fn new(config: &Config, partitions: i32) -> Self {
        assert!(partitions > 0, "a topic needs at least one partition");
        let (version, _) = watch::channel(0);
        MemoryLog {
            inner: Arc::new(Inner {
                partitions,
                transfer_topic: config.transfer_topic.clone(),
                payment_topic: config.payment_topic.clone(),
                topics: Mutex::new(HashMap::new()),
                version,
            }),
        }
    }

    /// The partition a key hashes to. Stable across processes and runs.
    pub fn partition_for_key(&self, key: &str) -> i32 {
        (fnv1a64(key.as_bytes()) % self.inner.partitions as u64) as i32
    }

    /// Appends a record to `topic`, keyed by [`Record::key`].
    pub fn publish<R: Record>(&self, topic: &str, record: &R) -> Result<PublishAck, LogError> {
        let value = serde_json::to_vec(record)?;
        let partition = self.partition_for_key(&record.key());

        let offset = {
            let mut topics = self.inner.topics.lock().expect("log mutex poisoned");
            let parts = topics
                .entry(topic.to_string())
                .or_insert_with(|| (0..self.inner.partitions).map(|_| Vec::new()).collect());
            let records = &mut parts[partition as usize];
            records.push(StoredRecord { value });
            (records.len() - 1) as i64
        };

        self.inner.version.send_modify(|v| *v += 1);
        Ok(PublishAck { partition, offset })
    }

    /// Decodes every record currently in `(topic, partition)`, with positions
    /// stamped. Intended for tests and diagnostics.
    pub fn snapshot<R: Record>(&self, topic: &str, partition: i32) -> Result<Vec<R>, LogError> {
        let batch = self.read_from(topic, partition, 0)?;
        let mut records = Vec::with_capacity(batch.len());
        for (offset, bytes) in batch {
            let mut record: R = serde_json::from_slice(&bytes)?;
            record.locate(partition, offset);
            records.push(record);
        }
        Ok(records)
    }

    /// Number of records currently in `(topic, partition)`.
    pub fn len(&self, topic: &str, partition: i32) -> usize {
        let topics = self.inner.topics.lock().expect("log mutex poisoned");
        topics
            .get(topic)
            .and_then(|parts| parts.get(partition as usize))
            .map(|records| records.len())
            .unwrap_or(0)
    }

    /// True if `(topic, partition)` holds no records.
    pub fn is_empty(&self, topic: &str, partition: i32) -> bool {
        self.len(topic, partition) == 0
    }

    fn read_from(
        &self,
        topic: &str,
        partition: i32,
        from: usize,
    ) -> Result<Vec<(i64, Vec<u8>)>, LogError> {
        if partition < 0 || partition >= self.inner.partitions {
            return Err(LogError::UnknownPartition(partition));
        }
        let topics = self.inner.topics.lock().expect("log mutex poisoned");
        let records = match topics.get(topic) {
            Some(parts) => &parts[partition as usize],
            // Topic not published yet: an empty read, not an error.
            None => return Ok(Vec::new()),
        };
        Ok(records
            .iter()
            .enumerate()
            .skip(from)
            .map(|(i, r)| (i as i64, r.value.clone()))
            .collect())
    }

    fn stream<R: Record>(
        &self,
        topic: &str,
        partition: i32,
        start: StartOffset,
        shutdown: &CancellationToken,
    ) -> RecordStream<R> {
        let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
        let (err_tx, err_rx) = oneshot::channel();
        let this = self.clone();
        let topic = topic.to_string();
        let token = shutdown.clone();

        tokio::spawn(async move {
            let result = this.fetch(topic, partition, start, token, tx).await;
            let _ = err_tx.send(result);
        });

        RecordStream {
            records: rx,
            errors: err_rx,
        }
    }

    async fn fetch<R: Record>(
        &self,
        topic: String,
        partition: i32,
        start: StartOffset,
        token: CancellationToken,
        tx: mpsc::Sender<R>,
    ) -> Result<(), LogError> {
        if partition < 0 || partition >= self.inner.partitions {
            return Err(LogError::UnknownPartition(partition));
        }

        let mut version = self.inner.version.subscribe();
        let mut next = match start {
            StartOffset::Oldest => 0,
            StartOffset::Newest => self.len(&topic, partition),
            StartOffset::At(n) => usize::try_from(n).map_err(|_| LogError::InvalidOffset(n))?,
        };

        loop {
            // Mark the current version seen before reading, so a publish that
            // lands between the read and the wait still wakes us.
            version.borrow_and_update();

            let batch = self.read_from(&topic, partition, next)?;
            if batch.is_empty() {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    changed = version.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                    }
                }
                continue;
            }

            for (offset, bytes) in batch {
                let mut record: R = serde_json::from_slice(&bytes)?;
                record.locate(partition, offset);
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    sent = tx.send(record) => {
                        if sent.is_err() {
                            // Receiver went away; nothing left to feed.
                            return Ok(());
                        }
                    }
                }
                next += 1;
            }
        }
    }
}

impl TransferPublisher for MemoryLog {
    fn create_transfer(
        &self,
        transfer: &Transfer,
    ) -> impl Future<Output = Result<PublishAck, PublishError>> + Send {
        let result = self
            .publish(&self.inner.transfer_topic, transfer)
            .map_err(PublishError::from);
        async move { result }
    }
}

impl TransferStream for MemoryLog {
    fn transfers_from_offset(
        &self,
        partition: i32,
        start: StartOffset,
        shutdown: &CancellationToken,
    ) -> RecordStream<Transfer> {
        self.stream(&self.inner.transfer_topic, partition, start, shutdown)
    }
}

impl PaymentPublisher for MemoryLog {
    fn create_payment(
        &self,
        payment: &Payment,
    ) -> impl Future<Output = Result<PublishAck, LogError>> + Send {
        let result = self.publish(&self.inner.payment_topic, payment);
        async move { result }
    }
}

impl PaymentStream for MemoryLog {
    fn payments_from_offset(
        &self,
        partition: i32,
        start: StartOffset,
        shutdown: &CancellationToken,
    ) -> RecordStream<Payment> {
        self.stream(&self.inner.payment_topic, partition, start, shutdown)
    }
}

/// 64-bit FNV-1a. Deterministic across runs, unlike the std hasher.
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
