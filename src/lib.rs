// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod cache;
pub mod cluster;
pub mod geo;
pub mod ingest;
pub mod major;
pub mod metrics;
pub mod reduce;
pub mod sample;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::cluster::{compute_clusters, locate_cluster_by_representative, Cluster, ClusterParams};
pub use crate::ingest::fallback::{CombinedFetchError, FetchOutcome, SourceFallbackFetcher};
pub use crate::ingest::types::{AlertLevel, FetchSource, Horizon, QuakeEvent};
pub use crate::major::MajorEventHistory;
pub use crate::reduce::{DerivedWindowState, ReduceConfig};

/// Build the in-process router with default configuration and no background
/// ingest. Integration tests seed state through `AppState::publish`.
pub fn app_with_state() -> (axum::Router, AppState) {
    let cfg = ingest::config::QuakewatchConfig::default();
    let state = AppState::new(&cfg);
    (api::router(state.clone()), state)
}
