//! The accountant stage.
//!
//! Consumes one partition of the payment topic in offset order and folds
//! per-account balances in memory, using the durable dedup index to make each
//! request's effect at-most-once across all time, replays included. The
//! per-record algorithm:
//!
//! 1. `has(request_id)` — on error: fatal.
//! 2. Seen: log and advance, no side effect.
//! 3. Fold the amount into the in-memory balance (checked decimal
//!    arithmetic; precision overflow is fatal misconfiguration).
//! 4. `put(request_id)` — on error: fatal.
//! 5. Emit `<account> $<balance>` to the sink.
//!
//! The balance becomes visible in-process one step before the dedup record is
//! durable. That is safe precisely because the balance map is ephemeral: a
//! crash between the two steps re-delivers the payment, `has` still answers
//! false, and replay reconstructs the same balance. Making balances durable
//! would invalidate this ordering.
//!
//! On startup the accountant owns no position: the operator picks the start
//! offset (`OLDEST` for a full rebuild), and the dedup index suppresses
//! payments that already took effect before the crash.

use std::collections::HashMap;
use std::io::Write;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::dedup::{DedupError, DedupIndex};
use crate::log::{LogError, PaymentStream, StartOffset};
use crate::types::{AccountId, Amount, ArithmeticError, Direction, Payment};

/// Errors that end the accountant.
#[derive(Debug, Error)]
pub enum AccountantError {
    /// Dedup index read or write failure.
    #[error("dedup index error: {0}")]
    Storage(#[from] DedupError),

    /// Balance arithmetic exceeded the configured precision.
    #[error("balance arithmetic failed: {0}")]
    Arithmetic(#[from] ArithmeticError),

    /// Log consume failure.
    #[error("transport error: {0}")]
    Transport(#[from] LogError),

    /// The observable sink could not be written.
    #[error("sink write failed: {0}")]
    Sink(#[from] std::io::Error),
}

/// Lifecycle of an accountant over its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Not yet consuming.
    Initializing,
    /// Draining the payment stream.
    Consuming,
    /// Terminal: clean cancellation.
    Stopped,
    /// Terminal: invariant-threatening failure.
    Fatal,
}

/// Folds one payment into a balance.
pub fn calc_balance(
    balance: Amount,
    payment: &Payment,
    max_digits: u32,
) -> Result<Amount, ArithmeticError> {
    match payment.direction {
        Direction::Outgoing => balance.checked_sub(payment.amount, max_digits),
        Direction::Incoming => balance.checked_add(payment.amount, max_digits),
    }
}

/// The accountant stage for a single payment partition.
pub struct Accountant<D, W> {
    dedup: D,
    sink: W,
    max_digits: u32,
    balances: HashMap<AccountId, Amount>,
    state: StageState,
}

impl<D, W> Accountant<D, W>
where
    D: DedupIndex,
    W: Write,
{
    /// Creates an accountant over an opened dedup index, with an empty
    /// balance map.
    pub fn new(dedup: D, sink: W, config: &Config) -> Self {
        Accountant {
            dedup,
            sink,
            max_digits: config.decimal_max_digits,
            balances: HashMap::new(),
            state: StageState::Initializing,
        }
    }

    /// Current per-account balances.
    pub fn balances(&self) -> &HashMap<AccountId, Amount> {
        &self.balances
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StageState {
        self.state
    }

    /// Consumes payments from `(partition, start)` until cancellation,
    /// folding each first-seen payment into the balance map.
    pub async fn run<S>(
        &mut self,
        payments: &S,
        partition: i32,
        start: StartOffset,
        shutdown: CancellationToken,
    ) -> Result<(), AccountantError>
    where
        S: PaymentStream,
    {
        let mut stream = payments.payments_from_offset(partition, start, &shutdown);
        self.state = StageState::Consuming;
        info!(partition, ?start, "accountant consuming");

        while let Some(payment) = stream.records.recv().await {
            if let Err(err) = self.apply(&payment) {
                self.state = StageState::Fatal;
                error!(
                    partition,
                    offset = payment.sequence_id,
                    error = %err,
                    "accountant failed"
                );
                return Err(err);
            }
        }

        // Record channel closed: collect the fetcher's terminal result.
        match stream.finish().await {
            Ok(()) => {
                self.state = StageState::Stopped;
                info!(partition, "accountant stopped");
                Ok(())
            }
            Err(err) => {
                self.state = StageState::Fatal;
                error!(partition, error = %err, "payments fetch failed");
                Err(err.into())
            }
        }
    }

    /// The per-record algorithm. Dedup check, fold, record, emit.
    fn apply(&mut self, payment: &Payment) -> Result<(), AccountantError> {
        if self.dedup.has(&payment.request_id)? {
            debug!(request = %payment.request_id, "skip request");
            return Ok(());
        }

        let previous = self
            .balances
            .get(&payment.account)
            .copied()
            .unwrap_or(Amount::ZERO);
        let balance = calc_balance(previous, payment, self.max_digits)?;

        // In-memory commit first; the put below makes the effect durable.
        self.balances.insert(payment.account.clone(), balance);
        self.dedup.put(&payment.request_id)?;

        writeln!(self.sink, "{} ${}", payment.account, balance)?;
        Ok(())
    }
}
