//! # WindowFilter
//! Pure time-window selection and id deduplication over event collections,
//! plus the proximity filters used by regional-context queries.
//!
//! Window semantics are exact half-open intervals: an event at
//! `reference - start_offset` is in, an event at `reference - end_offset` is
//! out. Events without a usable `time` never match and never error.

use std::collections::HashSet;

use chrono::Duration;

use crate::geo::{self, GeoPoint};
use crate::ingest::types::QuakeEvent;

/// Events with `time` in `[reference - start_offset, reference - end_offset)`.
///
/// Offsets count back from `reference_ms`; use the same unit for both per
/// call (`Duration::hours` / `Duration::days`).
pub fn select_window(
    events: &[QuakeEvent],
    start_offset: Duration,
    end_offset: Duration,
    reference_ms: i64,
) -> Vec<QuakeEvent> {
    let start = reference_ms - start_offset.num_milliseconds();
    let end = reference_ms - end_offset.num_milliseconds();
    events
        .iter()
        .filter(|e| e.valid_time().is_some_and(|t| t >= start && t < end))
        .cloned()
        .collect()
}

/// Keep only the first occurrence of each id, preserving input order.
///
/// Used where overlapping windows are concatenated; same id means same
/// event, so the copy seen first wins.
pub fn dedupe_by_id(events: &[QuakeEvent]) -> Vec<QuakeEvent> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(events.len());
    let mut out = Vec::with_capacity(events.len());
    for ev in events {
        if seen.insert(ev.id.as_str()) {
            out.push(ev.clone());
        }
    }
    out
}

/// Events within `radius_km` of `center`. Events without coordinates are
/// excluded, not errors.
pub fn within_radius_km(events: &[QuakeEvent], center: GeoPoint, radius_km: f64) -> Vec<QuakeEvent> {
    events
        .iter()
        .filter(|e| {
            e.geo_point()
                .is_some_and(|p| geo::haversine_km(p, center) <= radius_km)
        })
        .cloned()
        .collect()
}

/// Events within `radius_km` of a linear feature (e.g., a mapped fault trace).
pub fn near_polyline_km(events: &[QuakeEvent], line: &[GeoPoint], radius_km: f64) -> Vec<QuakeEvent> {
    events
        .iter()
        .filter(|e| {
            e.geo_point()
                .and_then(|p| geo::point_to_polyline_km(p, line))
                .is_some_and(|d| d <= radius_km)
        })
        .cloned()
        .collect()
}
