//! # ClusterEngine
//! Spatial-temporal grouping of events into connected components: two events
//! are adjacent when they are within `max_distance_km` great-circle AND
//! within `time_window_hours` of each other; components smaller than
//! `min_events` are discarded (their events are simply unclustered).
//!
//! Pure and deterministic: identical input and parameters always produce
//! identical membership and representative selection.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::geo;
use crate::ingest::types::QuakeEvent;
use crate::window;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    pub max_distance_km: f64,
    pub min_events: usize,
    pub time_window_hours: i64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            max_distance_km: 100.0,
            min_events: 3,
            time_window_hours: 48,
        }
    }
}

/// A non-empty group of related events plus derived summary fields. The
/// representative is the strongest member (ties: earliest time, then id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub members: Vec<QuakeEvent>,
    pub representative_id: String,
    pub count: usize,
    pub max_magnitude: Option<f64>,
    /// Milliseconds between the earliest and latest member.
    pub span_ms: i64,
    /// Place label of the representative event, when it has one.
    pub location: Option<String>,
}

/// Group `events` into clusters under `params`.
///
/// Events without usable coordinates or time cannot satisfy the adjacency
/// relation and are skipped. Pairwise distance checks are confined to
/// neighboring grid cells (cell edge sized to the distance threshold), so
/// snapshots in the thousands stay tractable.
pub fn compute_clusters(events: &[QuakeEvent], params: &ClusterParams) -> Vec<Cluster> {
    if params.min_events == 0 || params.max_distance_km <= 0.0 {
        return Vec::new();
    }

    // Same id = same event; keep the first copy only.
    let deduped = window::dedupe_by_id(events);
    let candidates: Vec<&QuakeEvent> = deduped
        .iter()
        .filter(|e| e.geo_point().is_some() && e.valid_time().is_some())
        .collect();
    if candidates.len() < params.min_events {
        return Vec::new();
    }

    let window_ms = params.time_window_hours.saturating_mul(3_600_000);

    // Coarse grid keyed by (lon cell, lat cell). Latitude degrees are a
    // constant ~111 km, so a cell edge of at least one distance threshold
    // confines in-range pairs to adjacent latitude cells. Longitude degrees
    // shrink toward the poles, so the longitude scan widens per latitude
    // band, and lon cell indices wrap across the antimeridian.
    let cell_deg = (params.max_distance_km / 111.0).ceil().max(1.0);
    let lon_cells = ((360.0 / cell_deg).ceil() as i64).max(1);
    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (idx, ev) in candidates.iter().enumerate() {
        let p = ev.geo_point().expect("filtered above");
        let key = (
            ((p.lon / cell_deg).floor() as i64).rem_euclid(lon_cells),
            (p.lat / cell_deg).floor() as i64,
        );
        grid.entry(key).or_default().push(idx);
    }

    let mut uf = UnionFind::new(candidates.len());
    for (&(cx, cy), cell) in &grid {
        let dx_span = lon_scan_span(cy, cell_deg, params.max_distance_km, lon_cells);
        for dy in -1..=1i64 {
            for dx in -dx_span..=dx_span {
                let nx = (cx + dx).rem_euclid(lon_cells);
                let Some(neighbor) = grid.get(&(nx, cy + dy)) else {
                    continue;
                };
                for &i in cell {
                    for &j in neighbor {
                        if j <= i {
                            continue; // each unordered pair once
                        }
                        if adjacent(candidates[i], candidates[j], params.max_distance_km, window_ms)
                        {
                            uf.union(i, j);
                        }
                    }
                }
            }
        }
    }

    // Collect components, drop the under-sized ones.
    let mut components: HashMap<usize, Vec<&QuakeEvent>> = HashMap::new();
    for (idx, ev) in candidates.iter().enumerate() {
        components.entry(uf.find(idx)).or_default().push(ev);
    }

    let mut clusters: Vec<Cluster> = components
        .into_values()
        .filter(|members| members.len() >= params.min_events)
        .map(|members| build_cluster(&members))
        .collect();

    // Stable output order: strongest cluster first, representative id as the
    // final arbiter.
    clusters.sort_by(|a, b| {
        cmp_mag_desc(a.max_magnitude, b.max_magnitude)
            .then_with(|| a.representative_id.cmp(&b.representative_id))
    });
    clusters
}

/// Linear scan for the cluster summarized by `representative_id`. Used to
/// re-resolve an externally persisted cluster reference against freshly
/// computed clusters.
pub fn locate_cluster_by_representative<'a>(
    clusters: &'a [Cluster],
    representative_id: &str,
) -> Option<&'a Cluster> {
    clusters
        .iter()
        .find(|c| c.representative_id == representative_id)
}

/// Deterministic cache key: parameters plus a content fingerprint of the
/// input events (id, time and magnitude per event, ordered by id),
/// hex-encoded SHA-256. An event revised in place changes the key even when
/// the id set does not.
pub fn cluster_signature(events: &[QuakeEvent], params: &ClusterParams) -> String {
    let deduped = window::dedupe_by_id(events);
    let mut rows: Vec<(&str, Option<i64>, Option<f64>)> = deduped
        .iter()
        .map(|e| (e.id.as_str(), e.time, e.magnitude))
        .collect();
    rows.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    hasher.update(format!(
        "d={:.3};n={};w={};",
        params.max_distance_km, params.min_events, params.time_window_hours
    ));
    for (id, time, mag) in rows {
        hasher.update(format!("{id}|{time:?}|{mag:?}\n"));
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Longitude cells to scan on each side of a cell in the given latitude band.
/// A longitude degree spans `~111 * cos(lat)` km; the band edge nearer the
/// pole is the tight case, so the span is computed there.
fn lon_scan_span(lat_cell: i64, cell_deg: f64, max_km: f64, lon_cells: i64) -> i64 {
    let edge_lat = (lat_cell as f64 * cell_deg)
        .abs()
        .max(((lat_cell + 1) as f64 * cell_deg).abs())
        .min(89.0);
    let km_per_lon_deg = 111.0 * edge_lat.to_radians().cos();
    let needed_deg = max_km / km_per_lon_deg.max(f64::EPSILON);
    ((needed_deg / cell_deg).ceil() as i64).clamp(1, lon_cells / 2 + 1)
}

fn adjacent(a: &QuakeEvent, b: &QuakeEvent, max_km: f64, window_ms: i64) -> bool {
    let (Some(ta), Some(tb)) = (a.valid_time(), b.valid_time()) else {
        return false;
    };
    if (ta - tb).abs() > window_ms {
        return false;
    }
    let (Some(pa), Some(pb)) = (a.geo_point(), b.geo_point()) else {
        return false;
    };
    geo::haversine_km(pa, pb) <= max_km
}

fn build_cluster(members: &[&QuakeEvent]) -> Cluster {
    let mut ordered: Vec<QuakeEvent> = members.iter().map(|e| (*e).clone()).collect();
    ordered.sort_by(|a, b| {
        a.valid_time()
            .cmp(&b.valid_time())
            .then_with(|| a.id.cmp(&b.id))
    });

    let representative = ordered
        .iter()
        .min_by(|a, b| {
            cmp_mag_desc(a.valid_magnitude(), b.valid_magnitude())
                .then_with(|| a.valid_time().cmp(&b.valid_time()))
                .then_with(|| a.id.cmp(&b.id))
        })
        .expect("clusters are non-empty");

    let max_magnitude = ordered
        .iter()
        .filter_map(|e| e.valid_magnitude())
        .fold(None::<f64>, |acc, m| Some(acc.map_or(m, |a| a.max(m))));
    let times: Vec<i64> = ordered.iter().filter_map(|e| e.valid_time()).collect();
    let span_ms = match (times.iter().min(), times.iter().max()) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0,
    };

    Cluster {
        representative_id: representative.id.clone(),
        location: representative.place.clone(),
        count: ordered.len(),
        max_magnitude,
        span_ms,
        members: ordered,
    }
}

/// Descending magnitude, missing magnitudes last.
fn cmp_mag_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]]; // path halving
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}
