//! Statistics store: the in-memory ledger plus its SQLite mirror.

use anyhow::Result;
use peloton_core::{
    ActivityStats, GlobalStatistics, RouteOutcome, SegmentId, SegmentLeaderboard,
    StatisticsLedger, UserStatistics,
};
use tokio::sync::Mutex;

use crate::persistence::{statistics as statistics_db, Database};

/// Lifetime statistics shared by every connection.
///
/// One async lock covers both the ledger update and its database write, so
/// snapshots of the same user reach the database in the order they were
/// produced.
pub struct StatisticsStore {
    ledger: Mutex<StatisticsLedger>,
    db: Option<Database>,
}

impl StatisticsStore {
    /// Store with no database behind it.
    pub fn in_memory() -> Self {
        Self {
            ledger: Mutex::new(StatisticsLedger::new()),
            db: None,
        }
    }

    /// Store backed by `db`, preloaded with everything already persisted.
    pub async fn with_database(db: Database) -> Result<Self> {
        let ledger = statistics_db::load_ledger(db.pool()).await?;
        tracing::info!(
            "Loaded statistics: {} users, {} routes, {} leaderboards",
            ledger.global().users,
            ledger.global().totals.routes,
            ledger.leaderboards().count()
        );
        Ok(Self {
            ledger: Mutex::new(ledger),
            db: Some(db),
        })
    }

    /// Fold a reduced route into the statistics and persist the result.
    ///
    /// A failed database write is logged; the in-memory update stands and
    /// the shutdown flush retries it.
    pub async fn register_route(&self, user: &str, stats: ActivityStats) -> RouteOutcome {
        let mut ledger = self.ledger.lock().await;
        let outcome = ledger.register_route(user, stats);
        if let Some(db) = &self.db {
            if let Err(err) = statistics_db::save_outcome(db.pool(), &outcome).await {
                tracing::warn!(
                    "Failed to persist statistics for {} ({}): {}",
                    user,
                    outcome.activity.route_id,
                    err
                );
            }
        }
        outcome
    }

    pub async fn user_statistics(&self, user: &str) -> Option<UserStatistics> {
        self.ledger.lock().await.user(user).cloned()
    }

    pub async fn global(&self) -> GlobalStatistics {
        self.ledger.lock().await.global().clone()
    }

    pub async fn attempted_by(&self, user: &str) -> Vec<SegmentLeaderboard> {
        self.ledger.lock().await.attempted_by(user)
    }

    pub async fn leaderboard(&self, segment_id: SegmentId) -> Option<SegmentLeaderboard> {
        self.ledger.lock().await.leaderboard(segment_id).cloned()
    }

    /// File name and id of every segment that already has a leaderboard.
    pub async fn known_segments(&self) -> Vec<(String, SegmentId)> {
        self.ledger
            .lock()
            .await
            .leaderboards()
            .map(|b| (b.file_name.clone(), b.segment_id))
            .collect()
    }

    /// Write the whole ledger to the database.
    pub async fn flush(&self) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        let ledger = self.ledger.lock().await;
        statistics_db::save_ledger(db.pool(), &ledger).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;
    use peloton_core::{RouteId, SegmentActivityStats, SegmentRef};
    use std::sync::Arc;

    fn activity(time: f64) -> ActivityStats {
        let mut stats = ActivityStats::new(RouteId(1));
        stats.distance_km = 1.0;
        stats.time_min = time;
        let mut s = SegmentActivityStats::new(&SegmentRef {
            id: SegmentId(1),
            file_name: "hill.gpx".to_string(),
        });
        s.time_min = time;
        stats.segments.push(s);
        stats
    }

    #[tokio::test]
    async fn concurrent_routes_keep_totals_consistent() {
        let store = Arc::new(StatisticsStore::in_memory());
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let user = if i % 2 == 0 { "ann" } else { "ben" };
                store.register_route(user, activity(i as f64 + 1.0)).await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let global = store.global().await;
        assert_eq!(global.totals.routes, 20);
        assert_eq!(global.users, 2);
        assert_eq!(store.user_statistics("ann").await.unwrap().totals.routes, 10);
        let board = store.leaderboard(SegmentId(1)).await.unwrap();
        assert_eq!(board.len(), 20);
        assert_eq!(board.entries().next().map(|e| e.user.as_str()), Some("ann"));
    }

    #[tokio::test]
    async fn persisted_statistics_survive_reload() {
        let path = std::env::temp_dir().join(format!("peloton-store-{}.db", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();

        let db = init_database(&path, 1).await.unwrap();
        let store = StatisticsStore::with_database(db).await.unwrap();
        store.register_route("ann", activity(4.0)).await;

        let db = init_database(&path, 1).await.unwrap();
        let reloaded = StatisticsStore::with_database(db).await.unwrap();
        assert_eq!(reloaded.global().await.totals.routes, 1);
        assert_eq!(reloaded.attempted_by("ann").await.len(), 1);
        assert_eq!(
            reloaded.known_segments().await,
            vec![("hill.gpx".to_string(), SegmentId(1))]
        );
    }
}
