// tests/api_cluster_cache.rs
//! Cluster endpoint behavior: MISS then HIT for the identical input
//! signature (via `X-Cluster-Cache`), MISS again when parameters change, and
//! representative-id reconstruction.

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Utc;
use serde_json::json;
use tower::ServiceExt; // for oneshot

use quakewatch::ingest::types::{Coordinates, FetchSource, Horizon, QuakeEvent};
use quakewatch::major::MajorEventHistory;
use quakewatch::reduce::{self, ReduceConfig};

fn quake(id: &str, lon: f64, mins_ago: i64, mag: f64, now: i64) -> QuakeEvent {
    QuakeEvent {
        id: id.to_string(),
        time: Some(now - mins_ago * 60_000),
        magnitude: Some(mag),
        place: Some(format!("offshore {id}")),
        alert: None,
        tsunami: false,
        depth_km: Some(12.0),
        coords: Some(Coordinates {
            lon,
            lat: 10.0,
            depth_km: Some(12.0),
        }),
    }
}

/// Router with a seeded short-horizon state holding one tight swarm.
fn app_with_swarm() -> (axum::Router, i64) {
    let (app, state) = quakewatch::app_with_state();
    let now = Utc::now().timestamp_millis();
    let snapshot = vec![
        quake("swarm-main", 30.00, 10, 5.5, now),
        quake("swarm-a", 30.05, 20, 2.1, now),
        quake("swarm-b", 30.10, 30, 2.4, now),
        // A loner far away; never clusters.
        quake("loner", 90.0, 15, 3.0, now),
    ];
    let mut hist = MajorEventHistory::default();
    state.publish(reduce::reduce(
        Horizon::Short,
        &snapshot,
        FetchSource::Primary,
        now,
        &ReduceConfig::default(),
        &mut hist,
    ));
    (app, now)
}

async fn post_clusters(
    app: &axum::Router,
    payload: serde_json::Value,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/clusters")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.expect("router response");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, headers, body)
}

fn cache_signal(headers: &HeaderMap) -> String {
    headers
        .get("x-cluster-cache")
        .expect("X-Cluster-Cache header must be present")
        .to_str()
        .unwrap()
        .to_ascii_uppercase()
}

#[tokio::test]
async fn identical_request_is_miss_then_hit() {
    let (app, _now) = app_with_swarm();
    let payload = json!({ "horizon": "short" });

    let (status, headers, body) = post_clusters(&app, payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_signal(&headers), "MISS");
    let first_sig = body["signature"].as_str().unwrap().to_string();
    assert_eq!(body["clusters"].as_array().unwrap().len(), 1);

    let (_, headers2, body2) = post_clusters(&app, payload).await;
    assert_eq!(cache_signal(&headers2), "HIT");
    assert_eq!(body2["signature"].as_str().unwrap(), first_sig);
}

#[tokio::test]
async fn changed_parameters_miss_again() {
    let (app, _now) = app_with_swarm();

    let (_, h1, _) = post_clusters(&app, json!({ "horizon": "short" })).await;
    assert_eq!(cache_signal(&h1), "MISS");

    let (_, h2, body) =
        post_clusters(&app, json!({ "horizon": "short", "min_events": 2 })).await;
    assert_eq!(cache_signal(&h2), "MISS", "new signature, new computation");
    assert!(body["clusters"].as_array().unwrap().len() >= 1);
}

#[tokio::test]
async fn cluster_shape_has_representative_and_summary() {
    let (app, _now) = app_with_swarm();
    let (_, _, body) = post_clusters(&app, json!({ "horizon": "short" })).await;

    let c = &body["clusters"][0];
    assert_eq!(c["representative_id"], json!("swarm-main"));
    assert_eq!(c["count"], json!(3));
    assert_eq!(c["max_magnitude"], json!(5.5));
    assert_eq!(c["location"], json!("offshore swarm-main"));
    assert!(c["members"].as_array().unwrap().len() == 3);
}

#[tokio::test]
async fn clusters_over_empty_horizon_are_empty_not_error() {
    let (app, _state) = quakewatch::app_with_state();
    let (status, headers, body) = post_clusters(&app, json!({ "horizon": "long" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_signal(&headers), "MISS");
    assert_eq!(body["clusters"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn representative_lookup_reconstructs_cluster() {
    let (app, _now) = app_with_swarm();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/clusters/swarm-main")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["representative_id"], json!("swarm-main"));
    assert_eq!(body["count"], json!(3));

    // A member that is not the representative does not resolve.
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/clusters/swarm-a")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
