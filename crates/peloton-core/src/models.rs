//! Core data models for the peloton pipeline.

use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, RouteId, SegmentId};

/// A single GPS fix.
///
/// Equality here is exact field equality. GPS-tolerant comparison lives in
/// [`crate::spatial::within_tolerance`] and is passed explicitly to the
/// subsequence search, because tolerant equality is not transitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: f64,
    /// UTC timestamp in `yyyy-MM-ddTHH:mm:ssZ` form.
    pub timestamp: String,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64, elevation_m: f64, timestamp: impl Into<String>) -> Self {
        Self {
            lat,
            lon,
            elevation_m,
            timestamp: timestamp.into(),
        }
    }
}

/// Lightweight reference to a catalog segment, cheap to ship to workers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentRef {
    pub id: SegmentId,
    pub file_name: String,
}

/// A predefined landmark sub-route loaded from the segment catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    /// Source file name, used as the display/lookup key.
    pub file_name: String,
    pub waypoints: Vec<Waypoint>,
}

impl Segment {
    pub fn new(id: SegmentId, file_name: impl Into<String>, waypoints: Vec<Waypoint>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            waypoints,
        }
    }

    pub fn to_ref(&self) -> SegmentRef {
        SegmentRef {
            id: self.id,
            file_name: self.file_name.clone(),
        }
    }
}

/// A segment found inside a route, in route-global indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedSegment {
    pub segment: SegmentRef,
    pub start: usize,
    /// Number of waypoints the segment spans. Always at least one.
    pub len: usize,
}

impl MatchedSegment {
    /// Inclusive index of the last route waypoint covered by the segment.
    pub fn end(&self) -> usize {
        self.start + self.len.saturating_sub(1)
    }
}

/// The owning-route information every chunk carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHeader {
    pub route_id: RouteId,
    pub client_id: ClientId,
    pub user: String,
}

/// One user's uploaded recording. Immutable once built.
#[derive(Debug, Clone)]
pub struct Route {
    pub header: RouteHeader,
    pub waypoints: Vec<Waypoint>,
    /// Segments found in the route, computed once at parse time.
    pub segments: Vec<MatchedSegment>,
}

impl Route {
    pub fn new(header: RouteHeader, waypoints: Vec<Waypoint>, segments: Vec<MatchedSegment>) -> Self {
        Self {
            header,
            waypoints,
            segments,
        }
    }

    pub fn id(&self) -> RouteId {
        self.header.route_id
    }

    pub fn user(&self) -> &str {
        &self.header.user
    }
}

/// A segment overlapping a chunk, re-expressed in chunk-local indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSegment {
    pub segment: SegmentRef,
    /// First local index covered by the segment.
    pub start: usize,
    /// Last local index covered by the segment (inclusive).
    pub end: usize,
}

/// A contiguous, overlap-preserving slice of a route sent to one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub route: RouteHeader,
    /// Zero-based position of this chunk within its route.
    pub index: usize,
    pub total_chunks: usize,
    pub waypoints: Vec<Waypoint>,
    pub segments: Vec<ChunkSegment>,
}

impl Chunk {
    pub fn route_id(&self) -> RouteId {
        self.route.route_id
    }
}

/// Time spent on one segment.
///
/// Two entries are equal when they refer to the same segment; merge lookups
/// rely on that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentActivityStats {
    pub segment_id: SegmentId,
    pub file_name: String,
    pub time_min: f64,
}

impl SegmentActivityStats {
    pub fn new(segment: &SegmentRef) -> Self {
        Self {
            segment_id: segment.id,
            file_name: segment.file_name.clone(),
            time_min: 0.0,
        }
    }
}

impl PartialEq for SegmentActivityStats {
    fn eq(&self, other: &Self) -> bool {
        self.segment_id == other.segment_id
    }
}

impl Eq for SegmentActivityStats {}

/// Accumulated statistics, either for one chunk (partial) or a whole route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub route_id: RouteId,
    pub distance_km: f64,
    pub speed_kmh: f64,
    pub elevation_gain_m: f64,
    pub time_min: f64,
    #[serde(default)]
    pub segments: Vec<SegmentActivityStats>,
}

impl ActivityStats {
    pub fn new(route_id: RouteId) -> Self {
        Self {
            route_id,
            distance_km: 0.0,
            speed_kmh: 0.0,
            elevation_gain_m: 0.0,
            time_min: 0.0,
            segments: Vec::new(),
        }
    }

    pub fn segment(&self, id: SegmentId) -> Option<&SegmentActivityStats> {
        self.segments.iter().find(|s| s.segment_id == id)
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut SegmentActivityStats> {
        self.segments.iter_mut().find(|s| s.segment_id == id)
    }

    /// Set average speed from total distance over total time.
    pub fn finalize(&mut self) {
        self.speed_kmh = if self.time_min > 0.0 {
            self.distance_km / (self.time_min / 60.0)
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: u64, name: &str) -> SegmentRef {
        SegmentRef {
            id: SegmentId(id),
            file_name: name.to_string(),
        }
    }

    #[test]
    fn segment_stats_equality_is_by_id_only() {
        let mut a = SegmentActivityStats::new(&seg(1, "hill.gpx"));
        let b = SegmentActivityStats::new(&seg(1, "renamed.gpx"));
        a.time_min = 12.0;
        assert_eq!(a, b);
        assert_ne!(a, SegmentActivityStats::new(&seg(2, "hill.gpx")));
    }

    #[test]
    fn finalize_computes_speed_from_totals() {
        let mut stats = ActivityStats::new(RouteId(1));
        stats.distance_km = 10.0;
        stats.time_min = 30.0;
        stats.finalize();
        assert!((stats.speed_kmh - 20.0).abs() < 1e-9);
    }

    #[test]
    fn finalize_with_zero_time_has_zero_speed() {
        let mut stats = ActivityStats::new(RouteId(1));
        stats.distance_km = 1.0;
        stats.finalize();
        assert_eq!(stats.speed_kmh, 0.0);
    }

    #[test]
    fn matched_segment_end_is_inclusive() {
        let m = MatchedSegment {
            segment: seg(1, "a.gpx"),
            start: 4,
            len: 3,
        };
        assert_eq!(m.end(), 6);
    }
}
