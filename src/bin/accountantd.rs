//! Sequentially reads one partition of the payment topic, deduplicates by
//! request id, and applies the changes to in-memory account balances.
//! Payments can be replayed from any offset: as long as the dedup database
//! survives, each request takes effect at most once. If the database is lost,
//! replaying from the oldest offset rebuilds it from the log.

use std::process::ExitCode;

use clap::Parser;

use wallet_pipeline::accountant::Accountant;
use wallet_pipeline::config::Config;
use wallet_pipeline::dedup::DedupStore;
use wallet_pipeline::log::kafka::KafkaClient;
use wallet_pipeline::log::{OFFSET_OLDEST, StartOffset};
use wallet_pipeline::shutdown;

/// Accountant stage of the payment pipeline.
#[derive(Parser)]
struct Cli {
    /// Broker address to connect to.
    #[arg(long, env = "BROKER", default_value = "127.0.0.1:9092")]
    broker: String,

    /// Partition number of the payment topic.
    #[arg(long, env = "PARTITION", default_value_t = 0)]
    partition: i32,

    /// Offset index of the partition (-1 to start from the newest, -2 from
    /// the oldest).
    #[arg(long, env = "OFFSET", default_value_t = OFFSET_OLDEST, allow_hyphen_values = true)]
    offset: i64,

    /// Enable debug logging.
    #[arg(long, env = "DEBUG", default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("accountantd: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let start = StartOffset::try_from(cli.offset)?;

    let client = KafkaClient::connect(&cli.broker, &config)?;
    let payments = client.payments();

    let dbname = format!("dedup{}.db", cli.partition);
    let dedup = DedupStore::open(&dbname)?;

    let shutdown = shutdown::on_interrupt();

    let stdout = std::io::stdout();
    let mut accountant = Accountant::new(dedup, stdout.lock(), &config);
    accountant
        .run(&payments, cli.partition, start, shutdown)
        .await?;
    Ok(())
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "error" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
