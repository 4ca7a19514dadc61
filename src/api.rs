// src/api.rs
//! HTTP surface for the dashboard: derived per-horizon state, major-event
//! history, and on-demand clustering with a server-side result cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::cache::ClusterCache;
use crate::cluster::{self, Cluster, ClusterParams};
use crate::ingest::config::QuakewatchConfig;
use crate::ingest::types::{FetchSource, Horizon, QuakeEvent};
use crate::major::MajorEventHistory;
use crate::reduce::DerivedWindowState;

#[derive(Clone)]
pub struct AppState {
    derived: Arc<RwLock<HashMap<Horizon, DerivedWindowState>>>,
    major: Arc<Mutex<MajorEventHistory>>,
    last_errors: Arc<RwLock<HashMap<Horizon, String>>>,
    cluster_cache: Arc<ClusterCache>,
    cluster_defaults: ClusterParams,
}

impl AppState {
    pub fn new(cfg: &QuakewatchConfig) -> Self {
        Self {
            derived: Arc::new(RwLock::new(HashMap::new())),
            major: Arc::new(Mutex::new(MajorEventHistory::default())),
            last_errors: Arc::new(RwLock::new(HashMap::new())),
            cluster_cache: Arc::new(ClusterCache::with_ttl_ms(cfg.effective_cache_ttl_ms())),
            cluster_defaults: cfg.cluster,
        }
    }

    // Shared handles for wiring the ingest side.
    pub fn derived_handle(&self) -> Arc<RwLock<HashMap<Horizon, DerivedWindowState>>> {
        self.derived.clone()
    }
    pub fn major_handle(&self) -> Arc<Mutex<MajorEventHistory>> {
        self.major.clone()
    }
    pub fn last_errors_handle(&self) -> Arc<RwLock<HashMap<Horizon, String>>> {
        self.last_errors.clone()
    }

    /// Replace one horizon's derived state wholesale (also used by tests to
    /// seed the router without a live feed).
    pub fn publish(&self, state: DerivedWindowState) {
        self.derived
            .write()
            .expect("derived-state rwlock poisoned")
            .insert(state.horizon, state);
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/state/{horizon}", get(get_state))
        .route("/major", get(get_major))
        .route("/clusters", post(post_clusters))
        .route("/clusters/{representative_id}", get(get_cluster_by_representative))
        .route("/debug/horizons", get(debug_horizons))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn get_state(State(state): State<AppState>, Path(horizon): Path<String>) -> Response {
    let Some(horizon) = Horizon::parse(&horizon) else {
        return (StatusCode::BAD_REQUEST, "unknown horizon").into_response();
    };
    let map = state.derived.read().expect("derived-state rwlock poisoned");
    match map.get(&horizon) {
        Some(s) => Json(s.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "no derived state yet").into_response(),
    }
}

async fn get_major(State(state): State<AppState>) -> Json<MajorEventHistory> {
    let h = state.major.lock().expect("major history mutex poisoned");
    Json(h.clone())
}

#[derive(Debug, Deserialize)]
struct ClusterRequest {
    #[serde(default)]
    horizon: Option<String>,
    #[serde(default)]
    max_distance_km: Option<f64>,
    #[serde(default)]
    min_events: Option<usize>,
    #[serde(default)]
    time_window_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ClusterResponse {
    signature: String,
    clusters: Vec<Cluster>,
}

/// Compute (or re-serve) clusters over a horizon's widest retained window.
/// `X-Cluster-Cache: HIT|MISS` reports whether the server-side cache held
/// the result for this exact input signature.
async fn post_clusters(
    State(state): State<AppState>,
    Json(req): Json<ClusterRequest>,
) -> Response {
    let horizon = match &req.horizon {
        Some(raw) => match Horizon::parse(raw) {
            Some(h) => h,
            None => return (StatusCode::BAD_REQUEST, "unknown horizon").into_response(),
        },
        None => Horizon::Short,
    };
    let params = ClusterParams {
        max_distance_km: req.max_distance_km.unwrap_or(state.cluster_defaults.max_distance_km),
        min_events: req.min_events.unwrap_or(state.cluster_defaults.min_events),
        time_window_hours: req
            .time_window_hours
            .unwrap_or(state.cluster_defaults.time_window_hours),
    };

    let events: Vec<QuakeEvent> = {
        let map = state.derived.read().expect("derived-state rwlock poisoned");
        map.get(&horizon)
            .map(|s| s.widest_window().to_vec())
            .unwrap_or_default()
    };

    let signature = cluster::cluster_signature(&events, &params);
    if let Some(clusters) = state.cluster_cache.get(&signature) {
        let body = Json(ClusterResponse { signature, clusters });
        return ([("x-cluster-cache", "HIT")], body).into_response();
    }

    let clusters = cluster::compute_clusters(&events, &params);
    state.cluster_cache.put(signature.clone(), clusters.clone());
    let body = Json(ClusterResponse { signature, clusters });
    ([("x-cluster-cache", "MISS")], body).into_response()
}

/// Reconstruction flow: an externally persisted cluster reference survives
/// only as its representative id; re-resolve it against clusters computed
/// from current data.
async fn get_cluster_by_representative(
    State(state): State<AppState>,
    Path(representative_id): Path<String>,
) -> Response {
    for horizon in Horizon::ALL {
        let events: Vec<QuakeEvent> = {
            let map = state.derived.read().expect("derived-state rwlock poisoned");
            map.get(&horizon)
                .map(|s| s.widest_window().to_vec())
                .unwrap_or_default()
        };
        if events.is_empty() {
            continue;
        }
        let clusters = cluster::compute_clusters(&events, &state.cluster_defaults);
        if let Some(found) = cluster::locate_cluster_by_representative(&clusters, &representative_id)
        {
            return Json(found.clone()).into_response();
        }
    }
    (StatusCode::NOT_FOUND, "no current cluster with that representative").into_response()
}

#[derive(Debug, Serialize)]
struct HorizonDebug {
    horizon: Horizon,
    has_state: bool,
    source: Option<FetchSource>,
    generated_at_ms: Option<i64>,
    retained: usize,
    last_error: Option<String>,
}

async fn debug_horizons(State(state): State<AppState>) -> Json<Vec<HorizonDebug>> {
    let derived = state.derived.read().expect("derived-state rwlock poisoned");
    let errors = state.last_errors.read().expect("last-errors rwlock poisoned");
    let out = Horizon::ALL
        .iter()
        .map(|&h| {
            let s = derived.get(&h);
            HorizonDebug {
                horizon: h,
                has_state: s.is_some(),
                source: s.map(|s| s.source),
                generated_at_ms: s.map(|s| s.generated_at_ms),
                retained: s.map(|s| s.widest_window().len()).unwrap_or(0),
                last_error: errors.get(&h).cloned(),
            }
        })
        .collect();
    Json(out)
}
