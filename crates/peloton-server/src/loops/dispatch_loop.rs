//! Route dispatch loop.
//!
//! Takes routes off the queue, splits them into chunks and hands the chunks
//! to workers round robin.

use std::sync::Arc;

use peloton_core::{split_route, PelotonError, Route, WorkerTask};
use tokio::sync::{broadcast, mpsc};

use crate::state::{AppState, WorkerRing};

pub async fn run_dispatch_loop(
    state: Arc<AppState>,
    mut routes: mpsc::UnboundedReceiver<Route>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        // Never split against an empty ring.
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Dispatch loop shutting down");
                break;
            }
            _ = state.workers().wait_for_worker() => {}
        }

        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Dispatch loop shutting down");
                break;
            }
            maybe_route = routes.recv() => {
                let Some(route) = maybe_route else {
                    tracing::info!("Route queue closed");
                    break;
                };
                let state = state.clone();
                tokio::spawn(async move {
                    match dispatch_route(state.workers(), &route) {
                        Ok(chunks) => {
                            tracing::debug!("Dispatched {} in {} chunks", route.id(), chunks);
                        }
                        Err(err) => {
                            tracing::error!("Dispatch of {} failed: {}", route.id(), err);
                        }
                    }
                });
            }
        }
    }
}

/// Split `route` and send each chunk, in waypoint order, to the next worker.
///
/// Returns the number of chunks sent.
pub fn dispatch_route(ring: &WorkerRing, route: &Route) -> Result<usize, PelotonError> {
    let chunks = split_route(route, ring.len())?;
    let total = chunks.len();
    for chunk in chunks {
        let index = chunk.index;
        let task = WorkerTask::Chunk {
            client_id: route.header.client_id,
            chunk,
        };
        let worker = ring.send_next(task).ok_or_else(|| {
            PelotonError::invariant(format!(
                "worker ring empty while dispatching chunk {index} of {}",
                route.id()
            ))
        })?;
        tracing::debug!("{} chunk {}/{} -> {}", route.id(), index + 1, total, worker);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::{StatisticsStore, WorkerHandle};
    use peloton_core::{ClientId, IdAllocator, RouteHeader, RouteId, Waypoint, WorkerId};
    use std::time::Duration;

    fn route(len: usize) -> Route {
        let waypoints = (0..len)
            .map(|i| {
                Waypoint::new(
                    38.0 + i as f64 * 0.001,
                    23.0,
                    100.0,
                    format!("2024-01-01T00:{:02}:00Z", i),
                )
            })
            .collect();
        Route::new(
            RouteHeader {
                route_id: RouteId(1),
                client_id: ClientId(9),
                user: "ann".to_string(),
            },
            waypoints,
            Vec::new(),
        )
    }

    fn worker(ring: &WorkerRing, id: u64) -> mpsc::UnboundedReceiver<WorkerTask> {
        let (tx, rx) = mpsc::unbounded_channel();
        ring.register(WorkerHandle {
            id: WorkerId(id),
            outbox: tx,
        });
        rx
    }

    fn indices(rx: &mut mpsc::UnboundedReceiver<WorkerTask>) -> Vec<usize> {
        let mut out = Vec::new();
        while let Ok(WorkerTask::Chunk { chunk, .. }) = rx.try_recv() {
            out.push(chunk.index);
        }
        out
    }

    #[test]
    fn five_waypoints_two_workers_round_robin() {
        let ring = WorkerRing::new();
        let mut w1 = worker(&ring, 1);
        let mut w2 = worker(&ring, 2);

        assert_eq!(dispatch_route(&ring, &route(5)).unwrap(), 3);
        assert_eq!(indices(&mut w1), vec![0, 2]);
        assert_eq!(indices(&mut w2), vec![1]);
    }

    #[test]
    fn chunks_carry_owning_client() {
        let ring = WorkerRing::new();
        let mut w1 = worker(&ring, 1);
        dispatch_route(&ring, &route(3)).unwrap();
        match w1.try_recv().unwrap() {
            WorkerTask::Chunk { client_id, chunk } => {
                assert_eq!(client_id, ClientId(9));
                assert_eq!(chunk.route.user, "ann");
            }
        }
    }

    #[test]
    fn closed_worker_is_skipped() {
        let ring = WorkerRing::new();
        drop(worker(&ring, 1));
        let mut w2 = worker(&ring, 2);

        assert_eq!(dispatch_route(&ring, &route(4)).unwrap(), 4);
        assert_eq!(indices(&mut w2), vec![0, 1, 2, 3]);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn empty_ring_is_invariant_violation() {
        let err = dispatch_route(&WorkerRing::new(), &route(3)).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[tokio::test]
    async fn loop_holds_routes_until_a_worker_connects() {
        let (state, routes_rx) = AppState::new(
            Config::default(),
            IdAllocator::new(),
            Vec::new(),
            StatisticsStore::in_memory(),
        );
        let state = Arc::new(state);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_dispatch_loop(state.clone(), routes_rx, shutdown_rx));

        state.enqueue_route(route(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut w1 = worker(state.workers(), 1);
        let task = tokio::time::timeout(Duration::from_secs(1), w1.recv())
            .await
            .expect("chunk dispatched");
        assert!(task.is_some());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
