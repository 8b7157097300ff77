//! The commit-log contract.
//!
//! The pipeline talks to the log through two narrow capabilities:
//!
//! - **Publish**: append a record keyed by some bytes; partition selection is
//!   a deterministic function of the key, and a successful return means the
//!   record is durable at the returned `(partition, offset)`.
//! - **Consume**: a lazy, restartable stream of records from one partition in
//!   strictly increasing offset order, starting at a concrete offset or at
//!   one of the `OLDEST`/`NEWEST` sentinels, terminating only on
//!   cancellation. Delivery is at-least-once.
//!
//! Consuming implementations run the fetcher task themselves: a stream hands
//! back a bounded record channel plus a capacity-one terminal-error channel.
//! The fetcher never reorders, honors the cancellation token on every
//! suspension point, and closes the record channel before reporting its
//! terminal result.

pub mod kafka;
pub mod memory;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::DomainError;
use crate::types::{Payment, Transfer};

/// Sentinel for "start at the oldest record of the partition".
pub const OFFSET_OLDEST: i64 = -2;
/// Sentinel for "start at the next record to arrive".
pub const OFFSET_NEWEST: i64 = -1;

/// Capacity of the record channel between a fetcher and its stage.
pub const RECORD_CHANNEL_CAPACITY: usize = 64;

/// Where a partition consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    /// From the oldest retained record.
    Oldest,
    /// From the next record to arrive.
    Newest,
    /// From a concrete non-negative offset.
    At(i64),
}

impl TryFrom<i64> for StartOffset {
    type Error = LogError;

    fn try_from(n: i64) -> Result<Self, LogError> {
        match n {
            OFFSET_OLDEST => Ok(StartOffset::Oldest),
            OFFSET_NEWEST => Ok(StartOffset::Newest),
            n if n >= 0 => Ok(StartOffset::At(n)),
            other => Err(LogError::InvalidOffset(other)),
        }
    }
}

/// Durable-ack position returned by a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    /// Partition the record was assigned to.
    pub partition: i32,
    /// Offset of the record within its partition.
    pub offset: i64,
}

/// Errors from log publish and consume paths.
#[derive(Debug, Error)]
pub enum LogError {
    /// Broker-side failure.
    #[error("broker error: {0}")]
    Broker(#[from] rdkafka::error::KafkaError),

    /// A record failed to encode or decode. The topics carry a typed schema,
    /// so consumers treat this as fatal rather than skipping the record.
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A consumed record carried no payload.
    #[error("record has no payload")]
    EmptyPayload,

    /// The requested partition does not exist.
    #[error("unknown partition {0}")]
    UnknownPartition(i32),

    /// The offset is neither a sentinel nor a concrete position.
    #[error("invalid start offset {0}")]
    InvalidOffset(i64),
}

/// Errors from publishing a transfer: either the log failed or the request
/// itself was rejected by the service.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// A typed record that can travel on the log.
///
/// The key determines the partition; `locate` stamps the log envelope's
/// position onto the record after consumption.
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    /// Partition key bytes for this record.
    fn key(&self) -> String;

    /// Stamps the record with the position it was read from.
    fn locate(&mut self, partition: i32, sequence_id: i64);
}

impl Record for Transfer {
    fn key(&self) -> String {
        self.id.to_canonical()
    }

    fn locate(&mut self, partition: i32, sequence_id: i64) {
        self.partition = partition;
        self.sequence_id = sequence_id;
    }
}

impl Record for Payment {
    fn key(&self) -> String {
        self.account.as_str().to_string()
    }

    fn locate(&mut self, partition: i32, sequence_id: i64) {
        self.partition = partition;
        self.sequence_id = sequence_id;
    }
}

/// A consuming stream: a bounded channel of records in offset order, plus a
/// one-shot terminal-error channel that resolves after the record channel
/// closes (`Ok(())` on clean cancellation).
pub struct RecordStream<T> {
    /// Records in strictly increasing offset order.
    pub records: mpsc::Receiver<T>,
    /// The fetcher's terminal result.
    pub errors: oneshot::Receiver<Result<(), LogError>>,
}

impl<T> RecordStream<T> {
    /// Waits for the fetcher's terminal result. Call after the record channel
    /// has been drained. A fetcher that went away without reporting counts as
    /// a clean stop.
    pub async fn finish(self) -> Result<(), LogError> {
        match self.errors.await {
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }
}

/// Publishes transfers to the transfer topic, keyed by request id.
pub trait TransferPublisher: Send + Sync {
    /// Publishes a transfer; resolves once the record is durable.
    fn create_transfer(
        &self,
        transfer: &Transfer,
    ) -> impl Future<Output = Result<PublishAck, PublishError>> + Send;
}

/// Consumes transfers from one partition of the transfer topic.
pub trait TransferStream {
    /// Starts a fetcher for `(partition, start)` and returns its channels.
    fn transfers_from_offset(
        &self,
        partition: i32,
        start: StartOffset,
        shutdown: &CancellationToken,
    ) -> RecordStream<Transfer>;
}

/// Publishes payments to the payment topic, keyed by account.
pub trait PaymentPublisher: Send + Sync {
    /// Publishes a payment; resolves once the record is durable.
    fn create_payment(
        &self,
        payment: &Payment,
    ) -> impl Future<Output = Result<PublishAck, LogError>> + Send;
}

/// Consumes payments from one partition of the payment topic.
pub trait PaymentStream {
    /// Starts a fetcher for `(partition, start)` and returns its channels.
    fn payments_from_offset(
        &self,
        partition: i32,
        start: StartOffset,
        shutdown: &CancellationToken,
    ) -> RecordStream<Payment>;
}
