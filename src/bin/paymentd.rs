//! Creates the incoming & outgoing payment pair for each money-transfer
//! request. Transfers can be replayed from any offset; duplicate payment
//! emissions are skipped by the next stage in the pipeline.

use std::process::ExitCode;

use clap::Parser;

use wallet_pipeline::config::Config;
use wallet_pipeline::expander::Expander;
use wallet_pipeline::log::kafka::KafkaClient;
use wallet_pipeline::log::{OFFSET_OLDEST, StartOffset};
use wallet_pipeline::shutdown;

/// Transfer-expander stage of the payment pipeline.
#[derive(Parser)]
struct Cli {
    /// Broker address to connect to.
    #[arg(long, env = "BROKER", default_value = "127.0.0.1:9092")]
    broker: String,

    /// Partition number of the transfer topic.
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
            eprintln!("paymentd: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let start = StartOffset::try_from(cli.offset)?;

    let client = KafkaClient::connect(&cli.broker, &config)?;
    let transfers = client.transfers();
    let payments = client.payments();

    let shutdown = shutdown::on_interrupt();

    let stdout = std::io::stdout();
    let mut expander = Expander::new(stdout.lock());
    expander
        .run(&transfers, &payments, cli.partition, start, shutdown)
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
