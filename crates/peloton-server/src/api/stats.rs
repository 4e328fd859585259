//! Read-only REST views of statistics and leaderboards.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use peloton_core::{GlobalStatistics, SegmentId, SegmentLeaderboard, UserStatistics};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SegmentSummary {
    pub id: SegmentId,
    pub file_name: String,
    pub waypoints: usize,
    pub entries: usize,
}

pub async fn global_statistics(State(state): State<Arc<AppState>>) -> Json<GlobalStatistics> {
    Json(state.store().global().await)
}

pub async fn user_statistics(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Json<UserStatistics>, StatusCode> {
    state
        .store()
        .user_statistics(&user)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Every leaderboard the user has an entry on.
pub async fn user_leaderboards(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Json<Vec<SegmentLeaderboard>> {
    Json(state.store().attempted_by(&user).await)
}

pub async fn list_segments(State(state): State<Arc<AppState>>) -> Json<Vec<SegmentSummary>> {
    let mut summaries = Vec::with_capacity(state.catalog().len());
    for segment in state.catalog() {
        let entries = state
            .store()
            .leaderboard(segment.id)
            .await
            .map(|b| b.len())
            .unwrap_or(0);
        summaries.push(SegmentSummary {
            id: segment.id,
            file_name: segment.file_name.clone(),
            waypoints: segment.waypoints.len(),
            entries,
        });
    }
    Json(summaries)
}

/// Leaderboard of one catalog segment. A segment nobody has ridden yet has
/// an empty board.
pub async fn segment_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<SegmentLeaderboard>, StatusCode> {
    let id = SegmentId(id);
    if let Some(board) = state.store().leaderboard(id).await {
        return Ok(Json(board));
    }
    state
        .catalog()
        .iter()
        .find(|s| s.id == id)
        .map(|s| Json(SegmentLeaderboard::new(s.id, &s.file_name)))
        .ok_or(StatusCode::NOT_FOUND)
}
