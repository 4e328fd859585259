//! Per-segment leaderboards ordered by completion time.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::ids::SegmentId;

/// One user's time on a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user: String,
    pub time_min: f64,
}

impl LeaderboardEntry {
    pub fn new(user: impl Into<String>, time_min: f64) -> Self {
        Self {
            user: user.into(),
            time_min,
        }
    }
}

/// Compare two segment times.
///
/// The raw difference is rounded away from zero before taking its sign, so
/// any two times that differ at all compare as unequal. A NaN on either side
/// falls back to the IEEE total order.
pub fn compare_times(a: f64, b: f64) -> Ordering {
    let diff = a - b;
    if diff.is_nan() {
        return a.total_cmp(&b);
    }
    let rounded = if diff > 0.0 {
        diff.ceil()
    } else if diff < 0.0 {
        diff.floor()
    } else {
        0.0
    };
    rounded.total_cmp(&0.0)
}

impl Ord for LeaderboardEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_times(self.time_min, other.time_min).then_with(|| self.user.cmp(&other.user))
    }
}

impl PartialOrd for LeaderboardEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LeaderboardEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LeaderboardEntry {}

/// Ranking of every attempt on one segment, fastest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentLeaderboard {
    pub segment_id: SegmentId,
    pub file_name: String,
    entries: BTreeSet<LeaderboardEntry>,
    users: BTreeSet<String>,
}

impl SegmentLeaderboard {
    pub fn new(segment_id: SegmentId, file_name: impl Into<String>) -> Self {
        Self {
            segment_id,
            file_name: file_name.into(),
            entries: BTreeSet::new(),
            users: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, user: &str, time_min: f64) {
        self.users.insert(user.to_string());
        self.entries.insert(LeaderboardEntry::new(user, time_min));
    }

    /// Whether `user` has at least one entry on this segment.
    pub fn has_attempted(&self, user: &str) -> bool {
        self.users.contains(user)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LeaderboardEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
