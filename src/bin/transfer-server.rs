//! HTTP server API for clients to create money transfers.
//!
//! Exposes a REST-style API with validation of transfer requests; accepted
//! transfers are published to the transfer topic for the pipeline to expand.

use std::process::ExitCode;

use clap::Parser;

use wallet_pipeline::config::Config;
use wallet_pipeline::log::kafka::KafkaClient;
use wallet_pipeline::server::{AppState, build_router};
use wallet_pipeline::shutdown;

/// Ingress stage of the payment pipeline.
#[derive(Parser)]
struct Cli {
    /// HTTP API address.
    #[arg(long, env = "HTTP", default_value = "127.0.0.1:8000")]
    http: String,

    /// Broker address to connect to.
    #[arg(long, env = "BROKER", default_value = "127.0.0.1:9092")]
    broker: String,

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
            eprintln!("transfer-server: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let client = KafkaClient::connect(&cli.broker, &config)?;

    let state = AppState::new(client.transfers(), config);
    let app = build_router(state);

    let shutdown = shutdown::on_interrupt();

    tracing::info!(addr = %cli.http, "api listening");
    let listener = tokio::net::TcpListener::bind(&cli.http).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("api stopped");
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
