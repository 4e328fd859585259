//! Peloton worker binary.

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peloton_worker::WorkerConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Map-phase worker for the peloton master")]
struct Args {
    /// Master worker endpoint (overrides PELOTON_MASTER_URL)
    #[arg(short, long)]
    master: Option<String>,

    /// Give up after this many failed connection attempts (0 = never)
    #[arg(long)]
    attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("peloton_worker=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = WorkerConfig::from_env();
    if let Some(master) = args.master {
        config.master_url = master;
    }
    if let Some(attempts) = args.attempts {
        config.connect_attempts = attempts;
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    peloton_worker::run_worker(&config, shutdown_rx).await
}
