//! Statistics and leaderboard persistence operations.

use anyhow::Result;
use chrono::Utc;
use peloton_core::{
    GlobalStatistics, RouteOutcome, SegmentId, SegmentLeaderboard, StatisticsLedger, Totals,
    UserStatistics,
};
use sqlx::{Sqlite, SqlitePool};
use std::collections::BTreeMap;

/// Upsert one user's totals within an existing transaction.
pub async fn upsert_user_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    stats: &UserStatistics,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_statistics (username, distance_km, elevation_gain_m, time_min, routes, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(username) DO UPDATE SET
            distance_km = ?2, elevation_gain_m = ?3,
            time_min = ?4, routes = ?5, updated_at = ?6
        "#,
    )
    .bind(&stats.user)
    .bind(stats.totals.distance_km)
    .bind(stats.totals.elevation_gain_m)
    .bind(stats.totals.time_min)
    .bind(stats.totals.routes as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Upsert the single global totals row within an existing transaction.
pub async fn upsert_global_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    global: &GlobalStatistics,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO global_statistics (id, distance_km, elevation_gain_m, time_min, routes, users, updated_at)
        VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            distance_km = ?1, elevation_gain_m = ?2,
            time_min = ?3, routes = ?4, users = ?5, updated_at = ?6
        "#,
    )
    .bind(global.totals.distance_km)
    .bind(global.totals.elevation_gain_m)
    .bind(global.totals.time_min)
    .bind(global.totals.routes as i64)
    .bind(global.users as i64)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Record one leaderboard entry. Identical entries collapse, as they do in memory.
pub async fn insert_entry_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    segment_id: SegmentId,
    segment_file: &str,
    user: &str,
    time_min: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO segment_leaderboard_entries (segment_id, segment_file, username, time_min, recorded_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(segment_id.0 as i64)
    .bind(segment_file)
    .bind(user)
    .bind(time_min)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Persist everything one completed route changed, atomically.
pub async fn save_outcome(pool: &SqlitePool, outcome: &RouteOutcome) -> Result<()> {
    let mut tx = pool.begin().await?;

    upsert_user_tx(&mut tx, &outcome.user).await?;
    upsert_global_tx(&mut tx, &outcome.global).await?;
    for segment in &outcome.activity.segments {
        insert_entry_tx(
            &mut tx,
            segment.segment_id,
            &segment.file_name,
            &outcome.user.user,
            segment.time_min,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Write the full ledger. Used for the shutdown flush.
pub async fn save_ledger(pool: &SqlitePool, ledger: &StatisticsLedger) -> Result<()> {
    let mut tx = pool.begin().await?;

    for user in ledger.users() {
        upsert_user_tx(&mut tx, user).await?;
    }
    upsert_global_tx(&mut tx, ledger.global()).await?;
    for board in ledger.leaderboards() {
        for entry in board.entries() {
            insert_entry_tx(&mut tx, board.segment_id, &board.file_name, &entry.user, entry.time_min)
                .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Rebuild the in-memory ledger from the database.
pub async fn load_ledger(pool: &SqlitePool) -> Result<StatisticsLedger> {
    let users = sqlx::query_as::<_, UserRow>(
        "SELECT username, distance_km, elevation_gain_m, time_min, routes FROM user_statistics",
    )
    .fetch_all(pool)
    .await?;

    let global = sqlx::query_as::<_, GlobalRow>(
        "SELECT distance_km, elevation_gain_m, time_min, routes, users FROM global_statistics WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    let entries = sqlx::query_as::<_, EntryRow>(
        "SELECT segment_id, segment_file, username, time_min FROM segment_leaderboard_entries",
    )
    .fetch_all(pool)
    .await?;

    let mut boards: BTreeMap<SegmentId, SegmentLeaderboard> = BTreeMap::new();
    for row in entries {
        let id = SegmentId(row.segment_id as u64);
        boards
            .entry(id)
            .or_insert_with(|| SegmentLeaderboard::new(id, &row.segment_file))
            .insert(&row.username, row.time_min);
    }

    Ok(StatisticsLedger::from_parts(
        users.into_iter().map(Into::into).collect(),
        global.map(Into::into).unwrap_or_default(),
        boards.into_values().collect(),
    ))
}

// Internal row types for SQLx
#[derive(sqlx::FromRow)]
struct UserRow {
    username: String,
    distance_km: f64,
    elevation_gain_m: f64,
    time_min: f64,
    routes: i64,
}

impl From<UserRow> for UserStatistics {
    fn from(row: UserRow) -> Self {
        UserStatistics {
            user: row.username,
            totals: Totals {
                distance_km: row.distance_km,
                elevation_gain_m: row.elevation_gain_m,
                time_min: row.time_min,
                routes: row.routes.max(0) as u64,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct GlobalRow {
    distance_km: f64,
    elevation_gain_m: f64,
    time_min: f64,
    routes: i64,
    users: i64,
}

impl From<GlobalRow> for GlobalStatistics {
    fn from(row: GlobalRow) -> Self {
        GlobalStatistics {
            totals: Totals {
                distance_km: row.distance_km,
                elevation_gain_m: row.elevation_gain_m,
                time_min: row.time_min,
                routes: row.routes.max(0) as u64,
            },
            users: row.users.max(0) as u64,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    segment_id: i64,
    segment_file: String,
    username: String,
    time_min: f64,
}
