//! The transfer-expander stage.
//!
//! Consumes transfer requests from one partition of the transfer topic and
//! fans each out into a payment pair: the outgoing (sender) payment first,
//! then the incoming (recipient) payment, both carrying the transfer's
//! request id and amount. Each publish waits for the broker's durable ack
//! before the next is issued; if the outgoing publish fails the incoming one
//! is never attempted and the stage dies, resuming from its input offset on
//! restart (at-least-once re-expansion, absorbed downstream by dedup).
//!
//! The two payments are keyed by different accounts and usually land on
//! different partitions, so no cross-partition ordering between them exists
//! or is needed; sender-first is a log-readability convention only.

use std::io::Write;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::log::{LogError, PaymentPublisher, PublishAck, StartOffset, TransferStream};
use crate::types::{Direction, Payment, Transfer};

/// Errors that end the expander.
#[derive(Debug, Error)]
pub enum ExpanderError {
    /// Log publish or consume failure.
    #[error("transport error: {0}")]
    Transport(#[from] LogError),

    /// The observable sink could not be written.
    #[error("sink write failed: {0}")]
    Sink(#[from] std::io::Error),
}

/// Synthesizes the payment pair for a transfer: outgoing first, then
/// incoming. Log positions are left for the broker to assign.
pub fn expand(transfer: &Transfer) -> [Payment; 2] {
    [
        Payment {
            request_id: transfer.id,
            account: transfer.from.clone(),
            direction: Direction::Outgoing,
            amount: transfer.amount,
            partition: 0,
            sequence_id: 0,
        },
        Payment {
            request_id: transfer.id,
            account: transfer.to.clone(),
            direction: Direction::Incoming,
            amount: transfer.amount,
            partition: 0,
            sequence_id: 0,
        },
    ]
}

/// The expander stage. Owns the observable sink; everything else is borrowed
/// per run.
pub struct Expander<W> {
    sink: W,
}

impl<W: Write> Expander<W> {
    /// Creates an expander writing its observable lines to `sink`.
    pub fn new(sink: W) -> Self {
        Expander { sink }
    }

    /// Consumes transfers from `(partition, start)` until cancellation,
    /// publishing each transfer's payment pair.
    ///
    /// Returns the number of fully expanded transfers on clean shutdown.
    pub async fn run<S, P>(
        &mut self,
        transfers: &S,
        payments: &P,
        partition: i32,
        start: StartOffset,
        shutdown: CancellationToken,
    ) -> Result<u64, ExpanderError>
    where
        S: TransferStream,
        P: PaymentPublisher,
    {
        let mut stream = transfers.transfers_from_offset(partition, start, &shutdown);
        let mut expanded = 0u64;

        'records: while let Some(transfer) = stream.records.recv().await {
            debug!(
                request = %transfer.id,
                offset = transfer.sequence_id,
                "expanding transfer"
            );

            for payment in expand(&transfer) {
                let ack = tokio::select! {
                    _ = shutdown.cancelled() => break 'records,
                    published = payments.create_payment(&payment) => published?,
                };
                self.emit(&payment, ack)?;
            }
            expanded += 1;
        }

        stream.finish().await?;
        Ok(expanded)
    }

    fn emit(&mut self, payment: &Payment, ack: PublishAck) -> Result<(), ExpanderError> {
        let sign = match payment.direction {
            Direction::Outgoing => '-',
            Direction::Incoming => '+',
        };
        writeln!(
            self.sink,
            "{}:{} {} {} {}${}",
            ack.partition, ack.offset, payment.request_id, payment.account, sign, payment.amount
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::log::memory::MemoryLog;
    use crate::types::{AccountId, Amount, RequestId};
    use std::future::Future;
    use std::time::Duration;

    fn transfer(request_id: &str, from: &str, to: &str, amount: &str) -> Transfer {
        Transfer {
            id: RequestId::parse(request_id).unwrap(),
            from: AccountId::parse(from).unwrap(),
            to: AccountId::parse(to).unwrap(),
            amount: Amount::parse(amount).unwrap(),
            partition: 0,
            sequence_id: 0,
        }
    }

    const REQ: &str = "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11";

    // ─── Fan-out ───

    #[test]
    fn expand_synthesizes_outgoing_then_incoming() {
        let t = transfer(REQ, "Alice", "Bob", "10.00");
        let [out, incoming] = expand(&t);

        assert_eq!(out.request_id, t.id);
        assert_eq!(out.account.as_str(), "Alice");
        assert_eq!(out.direction, Direction::Outgoing);
        assert_eq!(out.amount, t.amount);

        assert_eq!(incoming.request_id, t.id);
        assert_eq!(incoming.account.as_str(), "Bob");
        assert_eq!(incoming.direction, Direction::Incoming);
        assert_eq!(incoming.amount, t.amount);
    }

    // ─── Stage behavior over the in-process log ───

    fn payment_count(log: &MemoryLog, cfg: &Config, partitions: i32) -> usize {
        (0..partitions)
            .map(|p| log.len(&cfg.payment_topic, p))
            .sum()
    }

    #[tokio::test]
    async fn publishes_a_pair_per_transfer() {
        let cfg = Config::default();
        let log = MemoryLog::new(&cfg, 4);
        let token = CancellationToken::new();

        let t = transfer(REQ, "Alice", "Bob", "10.00");
        let transfer_partition = log.publish(&cfg.transfer_topic, &t).unwrap().partition;

        let mut expander = Expander::new(Vec::new());
        let runner = {
            let log = log.clone();
            let token = token.clone();
            async move {
                let n = expander
                    .run(&log, &log, transfer_partition, StartOffset::Oldest, token)
                    .await
                    .unwrap();
                (n, expander.sink)
            }
        };
        let handle = tokio::spawn(runner);

        // Wait until both halves of the pair are on the payment topic.
        while payment_count(&log, &cfg, 4) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
        let (expanded, sink) = handle.await.unwrap();

        assert_eq!(expanded, 1);

        let alice_partition = log.partition_for_key("Alice");
        let bob_partition = log.partition_for_key("Bob");
        let alice: Vec<Payment> = log.snapshot(&cfg.payment_topic, alice_partition).unwrap();
        let bob: Vec<Payment> = log.snapshot(&cfg.payment_topic, bob_partition).unwrap();

        let out = alice
            .iter()
            .find(|p| p.direction == Direction::Outgoing)
            .expect("outgoing payment for sender");
        assert_eq!(out.account.as_str(), "Alice");
        assert_eq!(out.amount, Amount::parse("10.00").unwrap());

        let incoming = bob
            .iter()
            .find(|p| p.direction == Direction::Incoming)
            .expect("incoming payment for recipient");
        assert_eq!(incoming.account.as_str(), "Bob");

        let lines = String::from_utf8(sink).unwrap();
        let lines: Vec<&str> = lines.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Alice -$10.00"), "got {:?}", lines[0]);
        assert!(lines[1].contains("Bob +$10.00"), "got {:?}", lines[1]);
    }

    #[tokio::test]
    async fn replayed_transfers_reuse_the_request_id() {
        let cfg = Config::default();
        let log = MemoryLog::new(&cfg, 1);
        let token = CancellationToken::new();

        // The same logical transfer delivered three times.
        let t = transfer(REQ, "Alice", "Bob", "10.00");
        for _ in 0..3 {
            log.publish(&cfg.transfer_topic, &t).unwrap();
        }

        let mut expander = Expander::new(std::io::sink());
        let handle = {
            let log = log.clone();
            let token = token.clone();
            tokio::spawn(async move {
                expander
                    .run(&log, &log, 0, StartOffset::Oldest, token)
                    .await
                    .unwrap()
            })
        };

        while payment_count(&log, &cfg, 1) < 6 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        token.cancel();
        assert_eq!(handle.await.unwrap(), 3);

        let payments: Vec<Payment> = log.snapshot(&cfg.payment_topic, 0).unwrap();
        assert_eq!(payments.len(), 6);
        assert!(payments.iter().all(|p| p.request_id == t.id));
    }

    // ─── Failure handling ───

    #[derive(Clone)]
    struct BrokenPublisher;

    impl PaymentPublisher for BrokenPublisher {
        fn create_payment(
            &self,
            _payment: &Payment,
        ) -> impl Future<Output = Result<PublishAck, LogError>> + Send {
            async { Err(LogError::EmptyPayload) }
        }
    }

    #[tokio::test]
    async fn outgoing_publish_failure_is_fatal() {
        let cfg = Config::default();
        let log = MemoryLog::new(&cfg, 1);
        let token = CancellationToken::new();

        log.publish(&cfg.transfer_topic, &transfer(REQ, "Alice", "Bob", "10.00"))
            .unwrap();

        let mut expander = Expander::new(Vec::new());
        let err = expander
            .run(&log, &BrokenPublisher, 0, StartOffset::Oldest, token)
            .await
            .unwrap_err();

        assert!(matches!(err, ExpanderError::Transport(_)));
        // The failed outgoing publish produced no observable line.
        assert!(expander.sink.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_the_stage_cleanly() {
        let cfg = Config::default();
        let log = MemoryLog::new(&cfg, 1);
        let token = CancellationToken::new();

        let mut expander = Expander::new(std::io::sink());
        token.cancel();
        let expanded = expander
            .run(&log, &log, 0, StartOffset::Oldest, token)
            .await
            .unwrap();
        assert_eq!(expanded, 0);
    }
}
