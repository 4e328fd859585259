//! Identifier newtypes and the allocator that hands them out.
//!
//! A single `IdAllocator` is owned by the coordinator and passed by reference
//! to whoever needs fresh ids. Counters start at 1 and only move forward, so
//! an id is unique for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Server-assigned identifier of one uploaded route.
    RouteId,
    "route"
);
id_type!(
    /// Identifier of one client connection on the master.
    ClientId,
    "client"
);
id_type!(
    /// Identifier of a catalog segment.
    SegmentId,
    "segment"
);
id_type!(
    /// Identifier of one worker connection on the master.
    WorkerId,
    "worker"
);

/// Monotonic id source for routes, clients, segments and workers.
#[derive(Debug)]
pub struct IdAllocator {
    route: AtomicU64,
    client: AtomicU64,
    segment: AtomicU64,
    worker: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            route: AtomicU64::new(1),
            client: AtomicU64::new(1),
            segment: AtomicU64::new(1),
            worker: AtomicU64::new(1),
        }
    }

    pub fn next_route(&self) -> RouteId {
        RouteId(self.route.fetch_add(1, Ordering::SeqCst))
    }

    pub fn next_client(&self) -> ClientId {
        ClientId(self.client.fetch_add(1, Ordering::SeqCst))
    }

    pub fn next_segment(&self) -> SegmentId {
        SegmentId(self.segment.fetch_add(1, Ordering::SeqCst))
    }

    pub fn next_worker(&self) -> WorkerId {
        WorkerId(self.worker.fetch_add(1, Ordering::SeqCst))
    }

    /// Make sure future segment ids start above `floor`.
    ///
    /// Used after reloading persisted leaderboards so that a restarted
    /// process never reuses an id that already has entries.
    pub fn reserve_segments_through(&self, floor: SegmentId) {
        self.segment.fetch_max(floor.0 + 1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_are_monotonic_per_kind() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_route(), RouteId(1));
        assert_eq!(ids.next_route(), RouteId(2));
        assert_eq!(ids.next_client(), ClientId(1));
        assert_eq!(ids.next_segment(), SegmentId(1));
        assert_eq!(ids.next_worker(), WorkerId(1));
    }

    #[test]
    fn concurrent_allocation_never_repeats() {
        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..100).map(|_| ids.next_route()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate {id}");
            }
        }
        assert_eq!(seen.len(), 800);
    }

    #[test]
    fn reserve_moves_segment_counter_forward_only() {
        let ids = IdAllocator::new();
        ids.reserve_segments_through(SegmentId(10));
        assert_eq!(ids.next_segment(), SegmentId(11));
        ids.reserve_segments_through(SegmentId(3));
        assert_eq!(ids.next_segment(), SegmentId(12));
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(RouteId(7).to_string(), "route-7");
        assert_eq!(ClientId(2).to_string(), "client-2");
    }
}
