//! Peloton master: segment catalog, route dispatch, result aggregation and
//! statistics over WebSocket.

pub mod api;
pub mod catalog;
pub mod config;
pub mod loops;
pub mod persistence;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use peloton_core::{IdAllocator, Route};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::state::{AppState, StatisticsStore};

/// Open the database, reload statistics and load the segment catalog.
pub async fn bootstrap(config: Config) -> Result<(Arc<AppState>, mpsc::UnboundedReceiver<Route>)> {
    let db =
        persistence::init_database(&config.database_path, config.database_max_connections).await?;
    let store = StatisticsStore::with_database(db).await?;

    let known: HashMap<_, _> = store.known_segments().await.into_iter().collect();
    let ids = IdAllocator::new();
    let catalog = catalog::load_catalog(&config.segments_dir, &ids, &known)?;
    tracing::info!(
        "Loaded {} segments from {}",
        catalog.len(),
        config.segments_dir.display()
    );

    let (state, routes_rx) = AppState::new(config, ids, catalog, store);
    Ok((Arc::new(state), routes_rx))
}

pub fn router(state: Arc<AppState>) -> Router {
    api::routes().with_state(state)
}

/// Serve on `listener` until `shutdown` fires, then flush statistics.
pub async fn run(
    listener: TcpListener,
    state: Arc<AppState>,
    routes_rx: mpsc::UnboundedReceiver<Route>,
    shutdown: broadcast::Sender<()>,
) -> Result<()> {
    let dispatch = tokio::spawn(loops::dispatch_loop::run_dispatch_loop(
        state.clone(),
        routes_rx,
        shutdown.subscribe(),
    ));

    let mut stop = shutdown.subscribe();
    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async move {
            let _ = stop.recv().await;
        })
        .await?;

    let _ = dispatch.await;
    state.store().flush().await?;
    tracing::info!("Statistics flushed");
    Ok(())
}
