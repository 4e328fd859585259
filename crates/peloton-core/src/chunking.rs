//! Splitting routes into overlapping chunks for the map phase.
//!
//! Every chunk after the first starts with the last waypoint of the previous
//! chunk, so the waypoint pair spanning a chunk boundary is computed exactly
//! once, by the later chunk.

use crate::error::{PelotonError, Result};
use crate::models::{Chunk, ChunkSegment, MatchedSegment, Route, Waypoint};

/// Chunk sizing for a route of `waypoints` points over `workers` workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// New waypoints per chunk.
    pub chunk_len: usize,
    pub expected_chunks: usize,
}

impl ChunkPlan {
    /// `n = ceil(W / 2N)` when `W >= N`, otherwise `n = 1`;
    /// `expected = ceil(W / n)`.
    pub fn new(waypoints: usize, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(PelotonError::invariant("cannot plan chunks without workers"));
        }
        if waypoints == 0 {
            return Err(PelotonError::parse("route has no waypoints"));
        }
        let chunk_len = if waypoints >= workers {
            waypoints.div_ceil(2 * workers)
        } else {
            1
        };
        Ok(Self {
            chunk_len,
            expected_chunks: waypoints.div_ceil(chunk_len),
        })
    }
}

/// Global inclusive waypoint ranges `[start, end]` of each chunk.
pub fn chunk_ranges(waypoints: usize, plan: ChunkPlan) -> Vec<(usize, usize)> {
    let mut ranges = Vec::with_capacity(plan.expected_chunks);
    if waypoints == 0 {
        return ranges;
    }
    let first_end = plan.chunk_len.min(waypoints) - 1;
    ranges.push((0, first_end));
    let mut end = first_end;
    while end + 1 < waypoints {
        let start = end;
        end = (start + plan.chunk_len).min(waypoints - 1);
        ranges.push((start, end));
    }
    ranges
}

/// Re-express route-level segment spans in the local indices of the chunk
/// covering `[chunk_start, chunk_end]`.
///
/// A segment is attached only when the overlap is more than one shared
/// boundary waypoint.
pub fn localize_segments(
    segments: &[MatchedSegment],
    chunk_start: usize,
    chunk_end: usize,
) -> Vec<ChunkSegment> {
    segments
        .iter()
        .filter(|m| !(chunk_start >= m.end() || chunk_end <= m.start))
        .map(|m| ChunkSegment {
            segment: m.segment.clone(),
            start: chunk_start.max(m.start) - chunk_start,
            end: chunk_end.min(m.end()) - chunk_start,
        })
        .collect()
}

/// Split `route` into chunks sized for `workers` workers.
pub fn split_route(route: &Route, workers: usize) -> Result<Vec<Chunk>> {
    let plan = ChunkPlan::new(route.waypoints.len(), workers)?;
    let ranges = chunk_ranges(route.waypoints.len(), plan);
    if ranges.len() != plan.expected_chunks {
        return Err(PelotonError::invariant(format!(
            "{} produced {} chunks, expected {}",
            route.id(),
            ranges.len(),
            plan.expected_chunks
        )));
    }

    let mut chunks = Vec::with_capacity(ranges.len());
    for (index, &(start, end)) in ranges.iter().enumerate() {
        let waypoints = route.waypoints[start..=end].to_vec();
        locate_in_route(route, &waypoints, start)?;
        chunks.push(Chunk {
            route: route.header.clone(),
            index,
            total_chunks: plan.expected_chunks,
            segments: localize_segments(&route.segments, start, end),
            waypoints,
        });
    }
    Ok(chunks)
}

/// Check that a chunk's waypoints sit in the parent route at `offset`.
fn locate_in_route(route: &Route, waypoints: &[Waypoint], offset: usize) -> Result<()> {
    match route.waypoints.get(offset..offset + waypoints.len()) {
        Some(slice) if slice == waypoints => Ok(()),
        _ => Err(PelotonError::invariant(format!(
            "chunk at offset {} is not a subsequence of {}",
            offset,
            route.id()
        ))),
    }
}
