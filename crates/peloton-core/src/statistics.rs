//! Lifetime user totals, process-wide totals and the leaderboard book.
//!
//! `StatisticsLedger` is the plain data structure; callers wrap it in a lock
//! so that one route's update of user totals, global totals and leaderboards
//! is observed atomically.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::ids::SegmentId;
use crate::leaderboard::SegmentLeaderboard;
use crate::models::ActivityStats;

/// Running totals shared by user and global statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub time_min: f64,
    pub routes: u64,
}

impl Totals {
    pub fn add(&mut self, stats: &ActivityStats) {
        self.distance_km += stats.distance_km;
        self.elevation_gain_m += stats.elevation_gain_m;
        self.time_min += stats.time_min;
        self.routes += 1;
    }

    pub fn average_distance_km(&self) -> f64 {
        per_route(self.distance_km, self.routes)
    }

    pub fn average_elevation_gain_m(&self) -> f64 {
        per_route(self.elevation_gain_m, self.routes)
    }

    pub fn average_time_min(&self) -> f64 {
        per_route(self.time_min, self.routes)
    }
}

fn per_route(total: f64, routes: u64) -> f64 {
    if routes == 0 {
        0.0
    } else {
        total / routes as f64
    }
}

/// Lifetime totals for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub user: String,
    #[serde(flatten)]
    pub totals: Totals,
}

impl UserStatistics {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            totals: Totals::default(),
        }
    }
}

/// Totals across every user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatistics {
    #[serde(flatten)]
    pub totals: Totals,
    pub users: u64,
}

/// What one completed route produced: the client receives exactly this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub activity: ActivityStats,
    pub user: UserStatistics,
    pub global: GlobalStatistics,
    /// Leaderboards of every segment the route touched.
    pub leaderboards: Vec<SegmentLeaderboard>,
}

#[derive(Debug, Clone, Default)]
pub struct StatisticsLedger {
    users: HashMap<String, UserStatistics>,
    global: GlobalStatistics,
    leaderboards: BTreeMap<SegmentId, SegmentLeaderboard>,
}

impl StatisticsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted parts.
    pub fn from_parts(
        users: Vec<UserStatistics>,
        global: GlobalStatistics,
        leaderboards: Vec<SegmentLeaderboard>,
    ) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.user.clone(), u)).collect(),
            global,
            leaderboards: leaderboards.into_iter().map(|b| (b.segment_id, b)).collect(),
        }
    }

    /// Fold one completed route into user totals, global totals and the
    /// leaderboards of every segment it touched.
    pub fn register_route(&mut self, user: &str, stats: ActivityStats) -> RouteOutcome {
        let is_new_user = !self.users.contains_key(user);
        let user_stats = self
            .users
            .entry(user.to_string())
            .or_insert_with(|| UserStatistics::new(user));
        user_stats.totals.add(&stats);
        let user_snapshot = user_stats.clone();

        if is_new_user {
            self.global.users += 1;
        }
        self.global.totals.add(&stats);

        let mut touched = Vec::with_capacity(stats.segments.len());
        for segment in &stats.segments {
            let board = self
                .leaderboards
                .entry(segment.segment_id)
                .or_insert_with(|| SegmentLeaderboard::new(segment.segment_id, &segment.file_name));
            board.insert(user, segment.time_min);
            touched.push(board.clone());
        }

        RouteOutcome {
            activity: stats,
            user: user_snapshot,
            global: self.global.clone(),
            leaderboards: touched,
        }
    }

    pub fn user(&self, user: &str) -> Option<&UserStatistics> {
        self.users.get(user)
    }

    pub fn users(&self) -> impl Iterator<Item = &UserStatistics> {
        self.users.values()
    }

    pub fn global(&self) -> &GlobalStatistics {
        &self.global
    }

    pub fn leaderboard(&self, segment_id: SegmentId) -> Option<&SegmentLeaderboard> {
        self.leaderboards.get(&segment_id)
    }

    pub fn leaderboards(&self) -> impl Iterator<Item = &SegmentLeaderboard> {
        self.leaderboards.values()
    }

    /// Every leaderboard on which `user` has an entry.
    pub fn attempted_by(&self, user: &str) -> Vec<SegmentLeaderboard> {
        self.leaderboards
            .values()
            .filter(|b| b.has_attempted(user))
            .cloned()
            .collect()
    }

    pub fn max_segment_id(&self) -> Option<SegmentId> {
        self.leaderboards.keys().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RouteId;
    use crate::models::{SegmentActivityStats, SegmentRef};

    fn activity(distance: f64, time: f64, segments: &[(u64, f64)]) -> ActivityStats {
        let mut stats = ActivityStats::new(RouteId(1));
        stats.distance_km = distance;
        stats.time_min = time;
        stats.elevation_gain_m = 10.0;
        for &(id, t) in segments {
            let mut s = SegmentActivityStats::new(&SegmentRef {
                id: SegmentId(id),
                file_name: format!("{id}.gpx"),
            });
            s.time_min = t;
            stats.segments.push(s);
        }
        stats
    }

    #[test]
    fn register_updates_user_and_global_totals() {
        let mut ledger = StatisticsLedger::new();
        ledger.register_route("ann", activity(5.0, 20.0, &[]));
        let outcome = ledger.register_route("ann", activity(7.0, 40.0, &[]));

        assert_eq!(outcome.user.totals.routes, 2);
        assert!((outcome.user.totals.distance_km - 12.0).abs() < 1e-9);
        assert!((outcome.user.totals.average_time_min() - 30.0).abs() < 1e-9);
        assert_eq!(outcome.global.users, 1);

        let outcome = ledger.register_route("ben", activity(1.0, 5.0, &[]));
        assert_eq!(outcome.global.users, 2);
        assert_eq!(outcome.global.totals.routes, 3);
        assert!((outcome.global.totals.distance_km - 13.0).abs() < 1e-9);
    }

    #[test]
    fn register_returns_touched_leaderboards_only() {
        let mut ledger = StatisticsLedger::new();
        ledger.register_route("ann", activity(1.0, 1.0, &[(1, 4.0)]));
        let outcome = ledger.register_route("ben", activity(1.0, 1.0, &[(2, 3.0)]));

        assert_eq!(outcome.leaderboards.len(), 1);
        assert_eq!(outcome.leaderboards[0].segment_id, SegmentId(2));
        assert_eq!(ledger.leaderboards().count(), 2);
        assert_eq!(ledger.attempted_by("ann").len(), 1);
        assert!(ledger.attempted_by("nobody").is_empty());
    }

    #[test]
    fn leaderboards_collect_entries_from_many_users() {
        let mut ledger = StatisticsLedger::new();
        ledger.register_route("ann", activity(1.0, 1.0, &[(1, 4.0)]));
        let outcome = ledger.register_route("ben", activity(1.0, 1.0, &[(1, 3.0)]));
        let order: Vec<_> = outcome.leaderboards[0].entries().map(|e| e.user.clone()).collect();
        assert_eq!(order, vec!["ben", "ann"]);
    }

    #[test]
    fn averages_handle_zero_routes() {
        let totals = Totals::default();
        assert_eq!(totals.average_distance_km(), 0.0);
        assert_eq!(totals.average_elevation_gain_m(), 0.0);
    }

    #[test]
    fn from_parts_restores_lookup() {
        let mut board = SegmentLeaderboard::new(SegmentId(4), "x.gpx");
        board.insert("ann", 2.0);
        let ledger = StatisticsLedger::from_parts(
            vec![UserStatistics::new("ann")],
            GlobalStatistics::default(),
            vec![board],
        );
        assert!(ledger.user("ann").is_some());
        assert_eq!(ledger.max_segment_id(), Some(SegmentId(4)));
    }
}
