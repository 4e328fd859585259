//! HTTP and WebSocket routes for the master.

pub mod clients;
pub mod stats;
pub mod workers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Create the API router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/v1/statistics", get(stats::global_statistics))
        .route("/v1/users/:user/statistics", get(stats::user_statistics))
        .route("/v1/users/:user/leaderboards", get(stats::user_leaderboards))
        .route("/v1/segments", get(stats::list_segments))
        .route("/v1/segments/:id/leaderboard", get(stats::segment_leaderboard))
        .route("/v1/clients", get(clients::client_ws_handler))
        .route("/v1/workers", get(workers::worker_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests;
