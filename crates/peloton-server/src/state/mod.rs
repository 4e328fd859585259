//! Shared server state: connections, the route queue and statistics.

pub mod store;
pub mod workers;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use peloton_core::{
    match_segments, ClientId, IdAllocator, PartialResult, Route, RouteHeader, Segment,
    ServerMessage, Waypoint,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::Config;
pub use store::StatisticsStore;
pub use workers::{WorkerHandle, WorkerRing};

/// Channels into one client connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// Drained by the connection's writer task. One element is one batch of
    /// frames written back to back.
    pub outbox: UnboundedSender<Vec<ServerMessage>>,
    /// Drained by the connection's collector task.
    pub results: UnboundedSender<PartialResult>,
}

/// Application state shared by every handler and loop.
pub struct AppState {
    config: Config,
    ids: IdAllocator,
    catalog: Vec<Segment>,
    clients: DashMap<ClientId, ClientHandle>,
    workers: WorkerRing,
    routes_tx: UnboundedSender<Route>,
    store: StatisticsStore,
}

impl AppState {
    /// Build the state and hand back the receiving end of the route queue.
    pub fn new(
        config: Config,
        ids: IdAllocator,
        catalog: Vec<Segment>,
        store: StatisticsStore,
    ) -> (Self, UnboundedReceiver<Route>) {
        let (routes_tx, routes_rx) = mpsc::unbounded_channel();
        let state = Self {
            config,
            ids,
            catalog,
            clients: DashMap::new(),
            workers: WorkerRing::new(),
            routes_tx,
            store,
        };
        (state, routes_rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn catalog(&self) -> &[Segment] {
        &self.catalog
    }

    pub fn workers(&self) -> &WorkerRing {
        &self.workers
    }

    pub fn store(&self) -> &StatisticsStore {
        &self.store
    }

    pub fn register_client(&self, handle: ClientHandle) -> ClientId {
        let id = self.ids.next_client();
        self.clients.insert(id, handle);
        id
    }

    pub fn remove_client(&self, id: ClientId) {
        self.clients.remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Route a worker's partial result to the collector of its client.
    ///
    /// Returns false when the client is gone; the partial is dropped.
    pub fn deliver_partial(&self, partial: PartialResult) -> bool {
        let Some(client) = self.clients.get(&partial.client_id) else {
            return false;
        };
        client.results.send(partial).is_ok()
    }

    /// Build a route from parsed waypoints, matching it against the catalog.
    pub fn build_route(&self, client_id: ClientId, user: &str, waypoints: Vec<Waypoint>) -> Route {
        let segments = match_segments(&waypoints, &self.catalog, self.config.gps_tolerance_m);
        let header = RouteHeader {
            route_id: self.ids.next_route(),
            client_id,
            user: user.to_string(),
        };
        Route::new(header, waypoints, segments)
    }

    pub fn enqueue_route(&self, route: Route) -> Result<()> {
        self.routes_tx
            .send(route)
            .map_err(|_| anyhow!("route queue closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peloton_core::{ActivityStats, Chunk, RouteId};

    fn state() -> (AppState, UnboundedReceiver<Route>) {
        AppState::new(
            Config::default(),
            IdAllocator::new(),
            Vec::new(),
            StatisticsStore::in_memory(),
        )
    }

    #[test]
    fn partials_reach_registered_client_only() {
        let (state, _routes) = state();
        let (outbox, _out_rx) = mpsc::unbounded_channel();
        let (results, mut results_rx) = mpsc::unbounded_channel();
        let client_id = state.register_client(ClientHandle { outbox, results });

        let wp = vec![Waypoint::new(1.0, 1.0, 0.0, "2024-01-01T00:00:00Z")];
        let route = state.build_route(client_id, "ann", wp);
        let chunk = Chunk {
            route: route.header.clone(),
            index: 0,
            total_chunks: 1,
            waypoints: route.waypoints.clone(),
            segments: Vec::new(),
        };
        let partial = PartialResult {
            client_id,
            chunk,
            stats: ActivityStats::new(RouteId(1)),
        };

        assert!(state.deliver_partial(partial.clone()));
        assert!(results_rx.try_recv().is_ok());

        state.remove_client(client_id);
        assert!(!state.deliver_partial(partial));
        assert_eq!(state.client_count(), 0);
    }

    #[test]
    fn enqueued_routes_come_out_in_order() {
        let (state, mut routes) = state();
        let wp = vec![Waypoint::new(1.0, 1.0, 0.0, "2024-01-01T00:00:00Z")];
        let a = state.build_route(ClientId(1), "ann", wp.clone());
        let b = state.build_route(ClientId(1), "ann", wp);
        state.enqueue_route(a).unwrap();
        state.enqueue_route(b).unwrap();
        assert_eq!(routes.try_recv().unwrap().id(), RouteId(1));
        assert_eq!(routes.try_recv().unwrap().id(), RouteId(2));
    }
}
