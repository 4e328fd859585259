//! Reduce phase: merging chunk partials into one route result.

use crate::error::{PelotonError, Result};
use crate::models::{ActivityStats, Chunk, SegmentActivityStats};

/// A chunk together with the statistics a worker computed for it.
pub type Partial = (Chunk, ActivityStats);

/// Merge every partial of one route into its final statistics.
///
/// Distance, elevation gain and time are summed. Average speed is the mean of
/// the per-chunk average speeds, not total distance over total time.
/// Segment entries are merged by segment id: the first occurrence becomes the
/// accumulator and later occurrences add their time into it.
pub fn reduce(partials: &[Partial]) -> Result<ActivityStats> {
    let Some((first_chunk, _)) = partials.first() else {
        return Err(PelotonError::invariant("reduce called with no partial results"));
    };
    let route_id = first_chunk.route_id();

    let mut result = ActivityStats::new(route_id);
    let mut speed_sum = 0.0;

    for (chunk, stats) in partials {
        if chunk.route_id() != route_id || stats.route_id != route_id {
            return Err(PelotonError::invariant(format!(
                "partial for {} / {} mixed into reduction of {}",
                chunk.route_id(),
                stats.route_id,
                route_id
            )));
        }
        result.distance_km += stats.distance_km;
        result.elevation_gain_m += stats.elevation_gain_m;
        result.time_min += stats.time_min;
        speed_sum += stats.speed_kmh;
        merge_segments(&mut result.segments, &stats.segments);
    }

    result.speed_kmh = speed_sum / partials.len() as f64;
    Ok(result)
}

fn merge_segments(into: &mut Vec<SegmentActivityStats>, from: &[SegmentActivityStats]) {
    for entry in from {
        match into.iter_mut().find(|existing| **existing == *entry) {
            Some(existing) => existing.time_min += entry.time_min,
            None => into.push(entry.clone()),
        }
    }
}
