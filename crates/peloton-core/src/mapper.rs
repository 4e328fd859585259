//! Map phase: per-chunk statistics, computed on workers.

use crate::error::Result;
use crate::models::{ActivityStats, Chunk, SegmentActivityStats};
use crate::spatial::{distance_km, elapsed_minutes, elevation_gain};

/// Compute partial statistics for one chunk.
///
/// Walks every consecutive waypoint pair. A segment gets a stats entry at its
/// first local index and accumulates the pair time for every local index in
/// `(start, end]`. Fails if any timestamp in the chunk is malformed.
pub fn map_chunk(chunk: &Chunk) -> Result<ActivityStats> {
    let mut stats = ActivityStats::new(chunk.route_id());

    if chunk.waypoints.is_empty() {
        return Ok(stats);
    }
    register_segments_starting_at(chunk, 0, &mut stats);

    for (i, pair) in chunk.waypoints.windows(2).enumerate() {
        let (prev, curr) = (&pair[0], &pair[1]);
        let idx = i + 1;
        let minutes = elapsed_minutes(prev, curr)?;

        register_segments_starting_at(chunk, idx, &mut stats);

        for local in chunk.segments.iter().filter(|s| idx > s.start && idx <= s.end) {
            match stats.segment_mut(local.segment.id) {
                Some(entry) => entry.time_min += minutes,
                None => {
                    let mut entry = SegmentActivityStats::new(&local.segment);
                    entry.time_min = minutes;
                    stats.segments.push(entry);
                }
            }
        }

        stats.distance_km += distance_km(prev, curr);
        stats.time_min += minutes;
        stats.elevation_gain_m += elevation_gain(prev, curr);
    }

    stats.finalize();
    Ok(stats)
}

fn register_segments_starting_at(chunk: &Chunk, idx: usize, stats: &mut ActivityStats) {
    for local in chunk.segments.iter().filter(|s| s.start == idx) {
        if stats.segment(local.segment.id).is_none() {
            stats.segments.push(SegmentActivityStats::new(&local.segment));
        }
    }
}
