//! Segment matching: locating catalog segments inside uploaded routes.

use crate::models::{MatchedSegment, Segment, Waypoint};
use crate::spatial::within_tolerance;

/// Find the first index `i` such that `haystack[i..i + needle.len()]` equals
/// `needle` element-wise under `eq`.
///
/// Sliding-window scan, O(|haystack| * |needle|) in the worst case. An empty
/// needle never matches.
pub fn find_subsequence<T, F>(haystack: &[T], needle: &[T], eq: F) -> Option<usize>
where
    F: Fn(&T, &T) -> bool,
{
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.iter().zip(needle).all(|(a, b)| eq(a, b)))
}

/// Locate every catalog segment that occurs in `waypoints`.
///
/// Only the first occurrence of each segment is recorded. Segments that
/// overlap each other inside the route are all kept.
pub fn match_segments(
    waypoints: &[Waypoint],
    catalog: &[Segment],
    tolerance_m: f64,
) -> Vec<MatchedSegment> {
    catalog
        .iter()
        .filter_map(|segment| {
            let start = find_subsequence(waypoints, &segment.waypoints, |a, b| {
                within_tolerance(a, b, tolerance_m)
            })?;
            Some(MatchedSegment {
                segment: segment.to_ref(),
                start,
                len: segment.waypoints.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SegmentId;
    use crate::spatial::GPS_TOLERANCE_M;

    fn line(start_lat: f64, count: usize) -> Vec<Waypoint> {
        (0..count)
            .map(|i| Waypoint::new(start_lat + i as f64 * 0.001, 23.7, 0.0, "2024-01-01T00:00:00Z"))
            .collect()
    }

    #[test]
    fn finds_first_exact_occurrence() {
        let hay = [1, 2, 3, 1, 2, 3];
        assert_eq!(find_subsequence(&hay, &[2, 3], |a, b| a == b), Some(1));
        assert_eq!(find_subsequence(&hay, &[3, 1, 2], |a, b| a == b), Some(2));
        assert_eq!(find_subsequence(&hay, &[3, 3], |a, b| a == b), None);
    }

    #[test]
    fn empty_or_longer_needle_does_not_match() {
        let hay = [1, 2];
        assert_eq!(find_subsequence(&hay, &[], |a: &i32, b| a == b), None);
        assert_eq!(find_subsequence(&hay, &[1, 2, 3], |a, b| a == b), None);
    }

    #[test]
    fn comparator_is_injected() {
        let hay = [10, 20, 31];
        let close = |a: &i32, b: &i32| (a - b).abs() <= 1;
        assert_eq!(find_subsequence(&hay, &[20, 30], close), Some(1));
    }

    #[test]
    fn matches_segment_within_gps_error() {
        let route = line(38.0, 10);
        // Shift every point ~3 m east; still inside tolerance.
        let shifted: Vec<Waypoint> = route[4..7]
            .iter()
            .map(|wp| Waypoint::new(wp.lat, wp.lon + 0.00003, wp.elevation_m, "2020-01-01T00:00:00Z"))
            .collect();
        let catalog = vec![Segment::new(SegmentId(1), "climb.gpx", shifted)];

        let matches = match_segments(&route, &catalog, GPS_TOLERANCE_M);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 4);
        assert_eq!(matches[0].end(), 6);
        assert_eq!(matches[0].segment.file_name, "climb.gpx");
    }

    #[test]
    fn keeps_overlapping_segments_independently() {
        let route = line(38.0, 10);
        let catalog = vec![
            Segment::new(SegmentId(1), "a.gpx", route[2..6].to_vec()),
            Segment::new(SegmentId(2), "b.gpx", route[4..8].to_vec()),
            Segment::new(SegmentId(3), "elsewhere.gpx", line(10.0, 3)),
        ];

        let matches = match_segments(&route, &catalog, GPS_TOLERANCE_M);
        let found: Vec<(u64, usize)> = matches.iter().map(|m| (m.segment.id.0, m.start)).collect();
        assert_eq!(found, vec![(1, 2), (2, 4)]);
    }
}
