// src/ingest/mod.rs
pub mod config;
pub mod fallback;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::ingest::fallback::{CombinedFetchError, SourceFallbackFetcher};
use crate::ingest::types::{FetchSource, Horizon};
use crate::major::MajorEventHistory;
use crate::reduce::{self, DerivedWindowState, ReduceConfig};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_primary_ok_total", "Snapshots served by the structured store.");
        describe_counter!(
            "fetch_primary_failed_total",
            "Primary fetch/validation failures that triggered fallback."
        );
        describe_counter!("fetch_secondary_ok_total", "Snapshots served by the raw feed.");
        describe_counter!("fetch_both_failed_total", "Passes where both sources failed.");
        describe_counter!("ingest_events_total", "Events received in successful snapshots.");
        describe_counter!("cluster_cache_hits_total", "Cluster cache hits.");
        describe_counter!("cluster_cache_misses_total", "Cluster cache misses.");
        describe_histogram!("fetch_primary_ms", "Structured store round-trip milliseconds.");
        describe_histogram!("fetch_secondary_ms", "Raw feed round-trip milliseconds.");
        describe_gauge!(
            "ingest_last_success_ts",
            "Unix seconds of the last successful pass, labeled per horizon."
        );
    });
}

/// Everything one horizon pass needs. Horizons share the derived-state map,
/// the major-event history, and the last-error map; each writes only its own
/// horizon key, and the history is guarded by its mutex (single writer).
pub struct IngestContext {
    pub fetcher: SourceFallbackFetcher,
    pub reduce_cfg: ReduceConfig,
    pub derived: Arc<RwLock<HashMap<Horizon, DerivedWindowState>>>,
    pub major: Arc<Mutex<MajorEventHistory>>,
    pub last_errors: Arc<RwLock<HashMap<Horizon, String>>>,
}

/// Fetch and reduce one horizon once. Only a fully completed reduction
/// replaces the horizon's derived state; a failed pass leaves prior state
/// intact and records the combined error.
pub async fn run_once(
    ctx: &IngestContext,
    horizon: Horizon,
) -> Result<(FetchSource, usize), CombinedFetchError> {
    ensure_metrics_described();

    let outcome = match ctx.fetcher.fetch(horizon).await {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(horizon = horizon.as_str(), error = %e, "ingest pass failed");
            ctx.last_errors
                .write()
                .expect("last-errors rwlock poisoned")
                .insert(horizon, e.to_string());
            return Err(e);
        }
    };

    let (source, events) = outcome.into_parts();
    counter!("ingest_events_total").increment(events.len() as u64);

    let now_ms = chrono::Utc::now().timestamp_millis();
    let state = {
        // Hold the history lock across the whole reduction so concurrent
        // horizon completions consolidate serially.
        let mut history = ctx.major.lock().expect("major history mutex poisoned");
        reduce::reduce(horizon, &events, source, now_ms, &ctx.reduce_cfg, &mut history)
    };
    let count = state.widest_window().len();

    ctx.derived
        .write()
        .expect("derived-state rwlock poisoned")
        .insert(horizon, state);
    ctx.last_errors
        .write()
        .expect("last-errors rwlock poisoned")
        .remove(&horizon);

    gauge!("ingest_last_success_ts", "horizon" => horizon.as_str()).set(now_ms as f64 / 1000.0);
    tracing::info!(
        horizon = horizon.as_str(),
        source = ?source,
        events = events.len(),
        retained = count,
        "ingest pass complete"
    );

    Ok((source, events.len()))
}
