//! Peloton master - accepts GPS routes and farms them out to workers

use anyhow::Result;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peloton_server::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("peloton_server=debug".parse()?),
        )
        .init();

    tracing::info!("Starting Peloton master...");

    let config = Config::from_env();
    tracing::info!(
        "Config: port={} segments={} db={} tolerance={}m route_timeout={}s",
        config.server_port,
        config.segments_dir.display(),
        config.database_path,
        config.gps_tolerance_m,
        config.route_timeout_secs
    );

    let port = config.server_port;
    let (state, routes_rx) = peloton_server::bootstrap(config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = signal_tx.send(());
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    peloton_server::run(listener, state, routes_rx, shutdown_tx).await
}
