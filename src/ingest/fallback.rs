// src/ingest/fallback.rs
//! Two-tier source fallback: query the structured store, validate, and only
//! on a validation failure query the raw feed. An explicit state machine
//! returning a tagged outcome, not exception-driven branching.
//!
//! Per invocation each source is attempted at most once; retry cadence is
//! the scheduler's concern.

use std::fmt;
use std::sync::Arc;

use metrics::counter;

use crate::ingest::types::{FetchSource, Horizon, QuakeEvent, SnapshotSource};

/// Source-identity marker the structured store must echo in its responses.
pub const STORE_SOURCE_MARKER: &str = "quake-store";

/// Both sources exhausted. Renders the primary reason first, then the
/// secondary, as the single user-visible failure for the horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedFetchError {
    pub primary: String,
    pub secondary: String,
}

impl fmt::Display for CombinedFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "primary source failed: {}; secondary source failed: {}",
            self.primary, self.secondary
        )
    }
}

impl std::error::Error for CombinedFetchError {}

/// Terminal success state: which source produced the snapshot. A secondary
/// success after a primary failure is still a success, not an error.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Primary(Vec<QuakeEvent>),
    Secondary(Vec<QuakeEvent>),
}

impl FetchOutcome {
    pub fn source(&self) -> FetchSource {
        match self {
            FetchOutcome::Primary(_) => FetchSource::Primary,
            FetchOutcome::Secondary(_) => FetchSource::Secondary,
        }
    }

    pub fn events(&self) -> &[QuakeEvent] {
        match self {
            FetchOutcome::Primary(e) | FetchOutcome::Secondary(e) => e,
        }
    }

    pub fn into_parts(self) -> (FetchSource, Vec<QuakeEvent>) {
        match self {
            FetchOutcome::Primary(e) => (FetchSource::Primary, e),
            FetchOutcome::Secondary(e) => (FetchSource::Secondary, e),
        }
    }
}

pub struct SourceFallbackFetcher {
    primary: Arc<dyn SnapshotSource>,
    secondary: Arc<dyn SnapshotSource>,
}

impl SourceFallbackFetcher {
    pub fn new(primary: Arc<dyn SnapshotSource>, secondary: Arc<dyn SnapshotSource>) -> Self {
        Self { primary, secondary }
    }

    /// Run the fallback sequence for one horizon. Strictly sequential: the
    /// secondary request is only issued once primary validation has failed.
    pub async fn fetch(&self, horizon: Horizon) -> Result<FetchOutcome, CombinedFetchError> {
        let primary_reason = match self.primary.fetch_snapshot(horizon).await {
            Ok(payload) => match validate_primary(&payload) {
                Ok(events) => {
                    counter!("fetch_primary_ok_total").increment(1);
                    return Ok(FetchOutcome::Primary(events));
                }
                Err(reason) => reason,
            },
            Err(e) => format!("transport error: {e:#}"),
        };

        tracing::warn!(
            horizon = horizon.as_str(),
            provider = self.primary.name(),
            reason = %primary_reason,
            "primary source failed, falling back"
        );
        counter!("fetch_primary_failed_total").increment(1);

        let secondary_reason = match self.secondary.fetch_snapshot(horizon).await {
            Ok(payload) => match validate_secondary(&payload) {
                Ok(events) => {
                    counter!("fetch_secondary_ok_total").increment(1);
                    return Ok(FetchOutcome::Secondary(events));
                }
                Err(reason) => reason,
            },
            Err(e) => format!("transport error: {e:#}"),
        };

        counter!("fetch_both_failed_total").increment(1);
        Err(CombinedFetchError {
            primary: primary_reason,
            secondary: secondary_reason,
        })
    }
}

/// Structured-store validation: the response must carry the store's source
/// marker and a well-formed (possibly empty) event array.
pub fn validate_primary(payload: &serde_json::Value) -> Result<Vec<QuakeEvent>, String> {
    match payload.get("source").and_then(|s| s.as_str()) {
        Some(STORE_SOURCE_MARKER) => {}
        Some(other) => return Err(format!("unexpected source marker '{other}'")),
        None => return Err("missing source marker".to_string()),
    }
    let Some(items) = payload.get("events").and_then(|e| e.as_array()) else {
        return Err("payload has no event array".to_string());
    };
    parse_event_array(items)
}

/// Raw-feed validation: a well-formed, NON-empty feature array. The raw feed
/// has no source marker; its shape is the GeoJSON feed format.
pub fn validate_secondary(payload: &serde_json::Value) -> Result<Vec<QuakeEvent>, String> {
    let Some(features) = payload.get("features").and_then(|f| f.as_array()) else {
        return Err("payload has no feature array".to_string());
    };
    if features.is_empty() {
        return Err("feature array is empty".to_string());
    }
    let events: Result<Vec<QuakeEvent>, String> = features
        .iter()
        .enumerate()
        .map(|(i, f)| feature_to_event(f).ok_or_else(|| format!("malformed feature at index {i}")))
        .collect();
    events
}

/// Minimum required shape per element: an object with a non-empty string id.
/// Numeric fields stay lenient (see `QuakeEvent`); a junk magnitude is a
/// data-quality issue, not a validation failure.
fn parse_event_array(items: &[serde_json::Value]) -> Result<Vec<QuakeEvent>, String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let has_id = item
                .get("id")
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.is_empty());
            if !has_id {
                return Err(format!("malformed event at index {i}: missing id"));
            }
            serde_json::from_value::<QuakeEvent>(item.clone())
                .map_err(|e| format!("malformed event at index {i}: {e}"))
        })
        .collect()
}

/// Flatten one GeoJSON feature (`properties` + `geometry.coordinates`) into
/// the internal event shape. `None` when the feature lacks a usable id.
fn feature_to_event(feature: &serde_json::Value) -> Option<QuakeEvent> {
    let id = feature.get("id")?.as_str().filter(|s| !s.is_empty())?;
    let props = feature.get("properties").cloned().unwrap_or_default();

    let coords = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(|c| c.as_array())
        .and_then(|c| {
            Some(crate::ingest::types::Coordinates {
                lon: c.first()?.as_f64()?,
                lat: c.get(1)?.as_f64()?,
                depth_km: c.get(2).and_then(|d| d.as_f64()),
            })
        });

    let mut flat = serde_json::Map::new();
    flat.insert("id".into(), serde_json::Value::String(id.to_string()));
    if let serde_json::Value::Object(p) = props {
        for (k, v) in p {
            match k.as_str() {
                "mag" => flat.insert("magnitude".into(), v),
                "time" | "place" | "alert" | "tsunami" => flat.insert(k, v),
                _ => None,
            };
        }
    }

    let mut ev: QuakeEvent = serde_json::from_value(serde_json::Value::Object(flat)).ok()?;
    ev.depth_km = coords.and_then(|c| c.depth_km);
    ev.coords = coords;
    Some(ev)
}
