// tests/ingest_pipeline.rs
//! End-to-end ingest passes: fetch through the fallback fetcher, reduce, and
//! publish derived state, with per-horizon failure isolation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::json;

use quakewatch::ingest::fallback::{SourceFallbackFetcher, STORE_SOURCE_MARKER};
use quakewatch::ingest::types::{FetchSource, Horizon, SnapshotSource};
use quakewatch::ingest::{run_once, IngestContext};
use quakewatch::major::MajorEventHistory;
use quakewatch::reduce::ReduceConfig;

/// Store payload with events a fixed number of minutes in the past, so they
/// land inside every window regardless of wall-clock time.
fn recent_store_payload(specs: &[(&str, i64, f64)]) -> serde_json::Value {
    let now = Utc::now().timestamp_millis();
    json!({
        "source": STORE_SOURCE_MARKER,
        "events": specs.iter().map(|(id, mins_ago, mag)| json!({
            "id": id,
            "time": now - mins_ago * 60_000,
            "magnitude": mag
        })).collect::<Vec<_>>()
    })
}

struct FixedSource {
    payload: Result<serde_json::Value, String>,
}

#[async_trait::async_trait]
impl SnapshotSource for FixedSource {
    async fn fetch_snapshot(&self, _horizon: Horizon) -> Result<serde_json::Value> {
        self.payload.clone().map_err(|e| anyhow!("{e}"))
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn ctx_with(
    primary: Result<serde_json::Value, String>,
    secondary: Result<serde_json::Value, String>,
) -> IngestContext {
    IngestContext {
        fetcher: SourceFallbackFetcher::new(
            Arc::new(FixedSource { payload: primary }),
            Arc::new(FixedSource { payload: secondary }),
        ),
        reduce_cfg: ReduceConfig::default(),
        derived: Arc::new(RwLock::new(HashMap::new())),
        major: Arc::new(Mutex::new(MajorEventHistory::default())),
        last_errors: Arc::new(RwLock::new(HashMap::new())),
    }
}

#[tokio::test]
async fn successful_pass_publishes_derived_state() {
    let ctx = ctx_with(
        Ok(recent_store_payload(&[("a", 5, 5.0), ("b", 10, 2.0)])),
        Err("unused".to_string()),
    );

    let (source, count) = run_once(&ctx, Horizon::Short).await.expect("pass succeeds");
    assert_eq!(source, FetchSource::Primary);
    assert_eq!(count, 2);

    let derived = ctx.derived.read().unwrap();
    let state = derived.get(&Horizon::Short).expect("state published");
    assert_eq!(state.source, FetchSource::Primary);
    assert_eq!(state.widest_window().len(), 2);
    let total: usize = state.histogram.iter().map(|b| b.count).sum();
    assert_eq!(total, 2);

    // Major event flowed into the shared history.
    let major = ctx.major.lock().unwrap();
    assert_eq!(major.most_recent.as_ref().unwrap().id, "a");
}

#[tokio::test]
async fn failed_pass_keeps_prior_state_and_records_error() {
    let good = ctx_with(
        Ok(recent_store_payload(&[("keep", 5, 3.0)])),
        Err("unused".to_string()),
    );
    run_once(&good, Horizon::Short).await.expect("seed pass");

    // Same shared maps, now a failing fetcher.
    let bad = IngestContext {
        fetcher: SourceFallbackFetcher::new(
            Arc::new(FixedSource {
                payload: Err("HTTP 500".to_string()),
            }),
            Arc::new(FixedSource {
                payload: Ok(json!({ "features": [] })),
            }),
        ),
        reduce_cfg: ReduceConfig::default(),
        derived: good.derived.clone(),
        major: good.major.clone(),
        last_errors: good.last_errors.clone(),
    };

    let err = run_once(&bad, Horizon::Short).await.expect_err("pass fails");
    assert!(err.primary.contains("HTTP 500"));

    // Prior derived state survives untouched.
    let derived = bad.derived.read().unwrap();
    let state = derived.get(&Horizon::Short).expect("prior state retained");
    assert_eq!(state.widest_window()[0].id, "keep");

    let errors = bad.last_errors.read().unwrap();
    assert!(errors.get(&Horizon::Short).unwrap().contains("HTTP 500"));
}

#[tokio::test]
async fn horizon_failure_does_not_block_other_horizons() {
    let ctx = ctx_with(
        Ok(recent_store_payload(&[("x", 5, 2.0)])),
        Err("unused".to_string()),
    );

    run_once(&ctx, Horizon::Short).await.expect("short ok");
    run_once(&ctx, Horizon::Long).await.expect("long ok");

    let derived = ctx.derived.read().unwrap();
    assert!(derived.contains_key(&Horizon::Short));
    assert!(derived.contains_key(&Horizon::Long));
    assert!(!derived.contains_key(&Horizon::Medium));
}

#[tokio::test]
async fn secondary_rescue_is_reported_as_secondary_sourced() {
    let now = Utc::now().timestamp_millis();
    let feed = json!({
        "metadata": { "generated": now },
        "features": [{
            "id": "feed-ev",
            "properties": { "mag": 4.9, "time": now - 60_000 },
            "geometry": { "coordinates": [142.0, 38.0, 24.0] }
        }]
    });
    let ctx = ctx_with(Err("HTTP 502".to_string()), Ok(feed));

    let (source, count) = run_once(&ctx, Horizon::Medium).await.expect("rescued");
    assert_eq!(source, FetchSource::Secondary);
    assert_eq!(count, 1);

    let derived = ctx.derived.read().unwrap();
    assert_eq!(
        derived.get(&Horizon::Medium).unwrap().source,
        FetchSource::Secondary
    );
}
