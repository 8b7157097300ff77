//! Kafka implementation of the log contract.
//!
//! One connected [`KafkaClient`] groups the transfer and payment services so
//! they share a producer over the same broker connection; the service handles
//! are cheap clones over a reference-counted inner. Publishes are synchronous
//! with the broker's durable ack, and the producer's consistent key hashing
//! does partition assignment. Each consuming stream runs its own partition
//! consumer inside the fetcher task; consumer-group offsets are never
//! committed, since the dedup index is the pipeline's effect-space cursor.

use std::future::Future;
use std::sync::Arc;

use rdkafka::ClientConfig;
use rdkafka::TopicPartitionList;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::types::{Payment, Transfer};

use super::{
    LogError, PaymentPublisher, PaymentStream, PublishAck, PublishError, RECORD_CHANNEL_CAPACITY,
    Record, RecordStream, StartOffset, TransferPublisher, TransferStream,
};

/// Group id reported to the broker. Required by the client library; offsets
/// are never committed under it.
const CONSUMER_GROUP: &str = "wallet-pipeline";

impl From<StartOffset> for rdkafka::Offset {
    fn from(start: StartOffset) -> Self {
        match start {
            StartOffset::Oldest => rdkafka::Offset::Beginning,
            StartOffset::Newest => rdkafka::Offset::End,
            StartOffset::At(n) => rdkafka::Offset::Offset(n),
        }
    }
}

/// A client to the underlying Kafka commit log.
///
/// Holds the shared producer; [`KafkaClient::transfers`] and
/// [`KafkaClient::payments`] hand out the topic services.
#[derive(Clone)]
pub struct KafkaClient {
    inner: Arc<KafkaInner>,
}

struct KafkaInner {
    brokers: String,
    transfer_topic: String,
    payment_topic: String,
    producer: FutureProducer,
}

impl KafkaClient {
    /// Connects to the broker and creates the shared producer.
    pub fn connect(broker: impl Into<String>, config: &Config) -> Result<Self, LogError> {
        let brokers = broker.into();
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "30000")
            .create()?;
        debug!(brokers = %brokers, "producer created");

        Ok(KafkaClient {
            inner: Arc::new(KafkaInner {
                brokers,
                transfer_topic: config.transfer_topic.clone(),
                payment_topic: config.payment_topic.clone(),
                producer,
            }),
        })
    }

    /// Transfer service handle sharing this client's connection.
    pub fn transfers(&self) -> KafkaTransferService {
        KafkaTransferService {
            client: self.clone(),
        }
    }

    /// Payment service handle sharing this client's connection.
    pub fn payments(&self) -> KafkaPaymentService {
        KafkaPaymentService {
            client: self.clone(),
        }
    }

    async fn publish<R: Record>(&self, topic: &str, record: &R) -> Result<PublishAck, LogError> {
        let payload = serde_json::to_vec(record)?;
        let key = record.key();
        debug!(topic, key = %key, "publishing record");

        // The client hashes the key to pick the partition; awaiting the
        // delivery future is the durable ack.
        let (partition, offset) = self
            .inner
            .producer
            .send(
                FutureRecord::to(topic).key(&key).payload(&payload),
                Timeout::Never,
            )
            .await
            .map_err(|(err, _)| LogError::Broker(err))?;

        debug!(topic, partition, offset, "record published");
        Ok(PublishAck { partition, offset })
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
        let inner = Arc::clone(&self.inner);
        let topic = topic.to_string();
        let token = shutdown.clone();

        tokio::spawn(async move {
            let result = fetch_partition::<R>(inner, topic, partition, start, token, tx).await;
            let _ = err_tx.send(result);
        });

        RecordStream {
            records: rx,
            errors: err_rx,
        }
    }
}

/// Fetcher task body: owns the partition consumer, pushes decoded records
/// onto the bounded channel in offset order, and stops on cancellation.
async fn fetch_partition<R: Record>(
    inner: Arc<KafkaInner>,
    topic: String,
    partition: i32,
    start: StartOffset,
    token: CancellationToken,
    tx: mpsc::Sender<R>,
) -> Result<(), LogError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &inner.brokers)
        .set("group.id", CONSUMER_GROUP)
        .set("enable.auto.commit", "false")
        .set("enable.partition.eof", "false")
        .create()?;

    let mut assignment = TopicPartitionList::new();
    assignment.add_partition_offset(&topic, partition, start.into())?;
    consumer.assign(&assignment)?;
    debug!(topic = %topic, partition, ?start, "messages reading started");

    loop {
        // Copy the envelope out before the next suspension point; the
        // borrowed message must not live across an await.
        let (payload, partition, offset) = {
            let message = tokio::select! {
                _ = token.cancelled() => {
                    debug!(topic = %topic, partition, "messages reading stopped");
                    return Ok(());
                }
                received = consumer.recv() => received?,
            };
            let payload = message.payload().ok_or(LogError::EmptyPayload)?.to_vec();
            (payload, message.partition(), message.offset())
        };

        let mut record: R = serde_json::from_slice(&payload)?;
        record.locate(partition, offset);

        tokio::select! {
            _ = token.cancelled() => {
                debug!(topic = %topic, partition, "messages reading stopped");
                return Ok(());
            }
            sent = tx.send(record) => {
                if sent.is_err() {
                    // The stage dropped its receiver; stop fetching.
                    return Ok(());
                }
            }
        }
    }
}

/// Kafka service storing money-transfer requests.
#[derive(Clone)]
pub struct KafkaTransferService {
    client: KafkaClient,
}

impl TransferPublisher for KafkaTransferService {
    fn create_transfer(
        &self,
        transfer: &Transfer,
    ) -> impl Future<Output = Result<PublishAck, PublishError>> + Send {
        async move {
            self.client
                .publish(&self.client.inner.transfer_topic, transfer)
                .await
                .map_err(PublishError::from)
        }
    }
}

impl TransferStream for KafkaTransferService {
    fn transfers_from_offset(
        &self,
        partition: i32,
        start: StartOffset,
        shutdown: &CancellationToken,
    ) -> RecordStream<Transfer> {
        self.client
            .stream(&self.client.inner.transfer_topic, partition, start, shutdown)
    }
}

/// Kafka service storing payment instructions.
#[derive(Clone)]
pub struct KafkaPaymentService {
    client: KafkaClient,
}

impl PaymentPublisher for KafkaPaymentService {
    fn create_payment(
        &self,
        payment: &Payment,
    ) -> impl Future<Output = Result<PublishAck, LogError>> + Send {
        self.client
            .publish(&self.client.inner.payment_topic, payment)
    }
}

impl PaymentStream for KafkaPaymentService {
    fn payments_from_offset(
        &self,
        partition: i32,
        start: StartOffset,
        shutdown: &CancellationToken,
    ) -> RecordStream<Payment> {
        self.client
            .stream(&self.client.inner.payment_topic, partition, start, shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_offsets_map_to_broker_offsets() {
        assert_eq!(
            rdkafka::Offset::from(StartOffset::Oldest),
            rdkafka::Offset::Beginning
        );
        assert_eq!(
            rdkafka::Offset::from(StartOffset::Newest),
            rdkafka::Offset::End
        );
        assert_eq!(
            rdkafka::Offset::from(StartOffset::At(5)),
            rdkafka::Offset::Offset(5)
        );
    }
}
