//! Per-client collection of partial results.
//!
//! Each client connection owns one collector. It feeds partials into a
//! `RouteAggregator`, spawns a reduce task whenever a route completes and
//! prunes routes whose chunks never all came back.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use peloton_core::{
    reduce, ClientId, Partial, PartialResult, PelotonError, RouteAggregator, ServerMessage,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::interval;

use crate::state::AppState;

/// Run until the client's result channel closes, then wait for every
/// in-flight reduction to finish before returning.
pub async fn run_collector_loop(
    state: Arc<AppState>,
    client_id: ClientId,
    outbox: mpsc::UnboundedSender<Vec<ServerMessage>>,
    mut results: mpsc::UnboundedReceiver<PartialResult>,
) -> Result<()> {
    let mut aggregator = RouteAggregator::new();
    let mut reducers: JoinSet<Result<(), PelotonError>> = JoinSet::new();
    let mut ticker = interval(state.config().prune_interval());
    let timeout = state.config().route_timeout();

    let outcome = loop {
        tokio::select! {
            maybe_partial = results.recv() => {
                let Some(partial) = maybe_partial else {
                    break Ok(());
                };
                let route_id = partial.chunk.route_id();
                match aggregator.accept(partial.chunk, partial.stats) {
                    Ok(Some(partials)) => {
                        tracing::debug!("{} complete for {}", route_id, client_id);
                        reducers.spawn(reduce_and_reply(state.clone(), partials, outbox.clone()));
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!("Collector for {} stopped: {}", client_id, err);
                        break Err(anyhow!(err));
                    }
                }
            }
            Some(joined) = reducers.join_next(), if !reducers.is_empty() => {
                if let Err(err) = flatten(joined) {
                    tracing::error!("Reduction for {} failed: {}", client_id, err);
                    break Err(err);
                }
            }
            _ = ticker.tick() => {
                for route_id in aggregator.prune_expired(timeout) {
                    tracing::warn!(
                        "Abandoned {} for {}: partial results missing after {:?}",
                        route_id,
                        client_id,
                        timeout
                    );
                }
            }
        }
    };

    if aggregator.in_flight() > 0 {
        tracing::info!(
            "{} disconnected with {} incomplete routes",
            client_id,
            aggregator.in_flight()
        );
    }

    // Results already reduced are persisted before the connection is released.
    while let Some(joined) = reducers.join_next().await {
        if let Err(err) = flatten(joined) {
            tracing::error!("Reduction for {} failed: {}", client_id, err);
        }
    }

    outcome
}

fn flatten(joined: Result<Result<(), PelotonError>, tokio::task::JoinError>) -> Result<()> {
    joined??;
    Ok(())
}

/// Reduce one completed route, record it and send the four-message result.
pub async fn reduce_and_reply(
    state: Arc<AppState>,
    partials: Vec<Partial>,
    outbox: mpsc::UnboundedSender<Vec<ServerMessage>>,
) -> Result<(), PelotonError> {
    let stats = reduce(&partials)?;
    let user = partials[0].0.route.user.clone();
    let route_id = stats.route_id;

    tracing::info!(
        "Reduced {} for {}: {:.2} km, {:.1} min, {} segments",
        route_id,
        user,
        stats.distance_km,
        stats.time_min,
        stats.segments.len()
    );

    let outcome = state.store().register_route(&user, stats).await;
    if outbox.send(ServerMessage::route_result(outcome)).is_err() {
        tracing::debug!("Client gone before result of {} could be sent", route_id);
    }
    Ok(())
}
