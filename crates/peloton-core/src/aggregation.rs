//! Per-connection collection of partial results with an exact completion
//! barrier.
//!
//! One `RouteAggregator` belongs to one client connection and is owned by a
//! single collector task, so it needs no internal locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{PelotonError, Result};
use crate::ids::RouteId;
use crate::models::{ActivityStats, Chunk};
use crate::reducer::Partial;

#[derive(Debug)]
enum RouteProgress {
    Collecting(Vec<Partial>),
    /// Reduction has been triggered; any further partial is an error.
    Complete,
}

#[derive(Debug)]
struct PendingRoute {
    progress: RouteProgress,
    expected: usize,
    touched_at: Instant,
}

#[derive(Debug, Default)]
pub struct RouteAggregator {
    routes: HashMap<RouteId, PendingRoute>,
}

impl RouteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one partial result.
    ///
    /// Returns every partial of the route exactly once, on the arrival that
    /// brings the count to `chunk.total_chunks`. A partial for a route that
    /// has already completed is an invariant violation.
    pub fn accept(&mut self, chunk: Chunk, stats: ActivityStats) -> Result<Option<Vec<Partial>>> {
        self.accept_at(chunk, stats, Instant::now())
    }

    fn accept_at(
        &mut self,
        chunk: Chunk,
        stats: ActivityStats,
        now: Instant,
    ) -> Result<Option<Vec<Partial>>> {
        let route_id = chunk.route_id();
        let expected = chunk.total_chunks;
        if expected == 0 {
            return Err(PelotonError::invariant(format!(
                "{route_id} reported zero total chunks"
            )));
        }

        let pending = self.routes.entry(route_id).or_insert_with(|| PendingRoute {
            progress: RouteProgress::Collecting(Vec::with_capacity(expected)),
            expected,
            touched_at: now,
        });
        pending.touched_at = now;

        if pending.expected != expected {
            return Err(PelotonError::invariant(format!(
                "{route_id} chunk claims {expected} total chunks, earlier chunks claimed {}",
                pending.expected
            )));
        }

        let RouteProgress::Collecting(partials) = &mut pending.progress else {
            return Err(PelotonError::invariant(format!(
                "{route_id} received more than {expected} partial results"
            )));
        };

        if partials.len() + 1 < expected {
            partials.push((chunk, stats));
            return Ok(None);
        }

        partials.push((chunk, stats));
        let complete = std::mem::replace(&mut pending.progress, RouteProgress::Complete);
        match complete {
            RouteProgress::Collecting(all) => Ok(Some(all)),
            RouteProgress::Complete => Ok(None),
        }
    }

    /// Number of partials received so far for a still-collecting route.
    #[cfg(test)]
    fn received(&self, route_id: RouteId) -> Option<usize> {
        match &self.routes.get(&route_id)?.progress {
            RouteProgress::Collecting(partials) => Some(partials.len()),
            RouteProgress::Complete => None,
        }
    }

    #[cfg(test)]
    fn is_complete(&self, route_id: RouteId) -> bool {
        matches!(
            self.routes.get(&route_id).map(|r| &r.progress),
            Some(RouteProgress::Complete)
        )
    }

    /// Routes still waiting for partials.
    pub fn in_flight(&self) -> usize {
        self.routes
            .values()
            .filter(|r| matches!(r.progress, RouteProgress::Collecting(_)))
            .count()
    }

    /// Drop every route untouched for longer than `max_age`.
    ///
    /// Returns the ids of incomplete routes that were abandoned. Completed
    /// tombstones are dropped silently.
    pub fn prune_expired(&mut self, max_age: Duration) -> Vec<RouteId> {
        self.prune_expired_at(Instant::now(), max_age)
    }

    fn prune_expired_at(&mut self, now: Instant, max_age: Duration) -> Vec<RouteId> {
        let mut abandoned = Vec::new();
        self.routes.retain(|id, route| {
            if now.duration_since(route.touched_at) <= max_age {
                return true;
            }
            if matches!(route.progress, RouteProgress::Collecting(_)) {
                abandoned.push(*id);
            }
            false
        });
        abandoned.sort();
        abandoned
    }
}
