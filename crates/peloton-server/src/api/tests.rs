use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use peloton_core::gpx_io::render_gpx;
use peloton_core::{ActivityStats, RouteId, SegmentActivityStats, SegmentId, Waypoint};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use crate::{config::Config, state::AppState};

async fn setup_app() -> (axum::Router, Arc<AppState>) {
    let root = std::env::temp_dir().join(format!("peloton-api-{}", uuid::Uuid::new_v4()));
    let segments_dir = root.join("segments");
    std::fs::create_dir_all(&segments_dir).unwrap();
    let points = vec![
        Waypoint::new(38.0, 23.0, 10.0, "2024-01-01T00:00:00Z"),
        Waypoint::new(38.001, 23.001, 12.0, "2024-01-01T00:01:00Z"),
    ];
    std::fs::write(
        segments_dir.join("harbour.gpx"),
        render_gpx("catalog", "harbour", &points),
    )
    .unwrap();

    let config = Config {
        segments_dir,
        database_path: root.join("peloton.db").to_string_lossy().to_string(),
        database_max_connections: 1,
        ..Config::default()
    };

    let (state, _routes) = crate::bootstrap(config).await.expect("bootstrap");
    (crate::router(state.clone()), state)
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn ride(segment_time: f64) -> ActivityStats {
    let mut stats = ActivityStats::new(RouteId(1));
    stats.distance_km = 3.0;
    stats.time_min = 12.0;
    stats.elevation_gain_m = 20.0;
    let mut segment = SegmentActivityStats::new(&peloton_core::SegmentRef {
        id: SegmentId(1),
        file_name: "harbour.gpx".to_string(),
    });
    segment.time_min = segment_time;
    stats.segments.push(segment);
    stats
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _state) = setup_app().await;
    let res = get(&app, "/health").await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn fresh_server_has_zero_statistics() {
    let (app, _state) = setup_app().await;
    let body = read_json(get(&app, "/v1/statistics").await).await;
    assert_eq!(body["routes"], 0);
    assert_eq!(body["users"], 0);
    assert_eq!(body["distance_km"], 0.0);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let (app, _state) = setup_app().await;
    let res = get(&app, "/v1/users/ghost/statistics").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn segments_lists_catalog() {
    let (app, _state) = setup_app().await;
    let body = read_json(get(&app, "/v1/segments").await).await;
    let segments = body.as_array().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0]["id"], 1);
    assert_eq!(segments[0]["file_name"], "harbour.gpx");
    assert_eq!(segments[0]["waypoints"], 2);
    assert_eq!(segments[0]["entries"], 0);
}

#[tokio::test]
async fn unridden_segment_has_empty_board() {
    let (app, _state) = setup_app().await;
    let res = get(&app, "/v1/segments/1/leaderboard").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["file_name"], "harbour.gpx");
    assert_eq!(body["entries"].as_array().map(|e| e.len()), Some(0));

    let res = get(&app, "/v1/segments/99/leaderboard").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn registered_routes_show_up_in_views() {
    let (app, state) = setup_app().await;
    state.store().register_route("userA", ride(10.0)).await;
    state.store().register_route("userB", ride(9.5)).await;

    let body = read_json(get(&app, "/v1/users/userA/statistics").await).await;
    assert_eq!(body["user"], "userA");
    assert_eq!(body["routes"], 1);

    let body = read_json(get(&app, "/v1/statistics").await).await;
    assert_eq!(body["users"], 2);
    assert_eq!(body["routes"], 2);

    let body = read_json(get(&app, "/v1/segments/1/leaderboard").await).await;
    let users: Vec<_> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["user"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(users, vec!["userB", "userA"]);

    let body = read_json(get(&app, "/v1/users/userA/leaderboards").await).await;
    assert_eq!(body.as_array().map(|b| b.len()), Some(1));
    let body = read_json(get(&app, "/v1/users/ghost/leaderboards").await).await;
    assert_eq!(body.as_array().map(|b| b.len()), Some(0));
}
