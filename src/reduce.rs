//! # AggregationReducer
//! Turns one raw feed snapshot into the derived per-horizon state the
//! dashboard reads: named time windows, a capped map-display subset, daily
//! counts, a priority-biased sample, and a magnitude histogram, while folding
//! qualifying events into the shared major-event history.
//!
//! Derived state is recomputed wholesale on every successful fetch; nothing
//! is patched in place.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::{FetchSource, Horizon, QuakeEvent};
use crate::major::MajorEventHistory;
use crate::sample::{self, HistogramBucket, MagnitudeRange};
use crate::window;

/// One named window slice, e.g. "last_hour".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedWindow {
    pub name: String,
    pub events: Vec<QuakeEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCount {
    /// UTC calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub count: usize,
}

/// Fully derived view for one horizon. Replaced atomically per successful
/// fetch; never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedWindowState {
    pub horizon: Horizon,
    pub windows: Vec<NamedWindow>,
    /// Strongest-first subset bounded for map rendering.
    pub map_display: Vec<QuakeEvent>,
    pub daily_counts: Vec<DailyCount>,
    pub sample: Vec<QuakeEvent>,
    pub histogram: Vec<HistogramBucket>,
    pub generated_at_ms: i64,
    pub source: FetchSource,
}

impl DerivedWindowState {
    /// The widest retained window; clustering and reconstruction flows run
    /// over this slice.
    pub fn widest_window(&self) -> &[QuakeEvent] {
        self.windows
            .last()
            .map(|w| w.events.as_slice())
            .unwrap_or(&[])
    }
}

/// Reduction knobs; defaults match the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    /// Magnitude at or above which an event is "major".
    pub major_magnitude: f64,
    pub sample_size: usize,
    /// Priority cut for the biased sample.
    pub sample_priority_magnitude: f64,
    pub map_display_cap: usize,
    pub histogram_ranges: Vec<MagnitudeRange>,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            major_magnitude: 4.5,
            sample_size: 150,
            sample_priority_magnitude: 4.5,
            map_display_cap: 400,
            histogram_ranges: sample::default_magnitude_ranges(),
        }
    }
}

/// Window layout per horizon, narrowest first. Offsets are hours back from
/// the reference time.
fn window_layout(horizon: Horizon) -> &'static [(&'static str, i64)] {
    match horizon {
        Horizon::Short => &[("last_hour", 1), ("last_24h", 24)],
        Horizon::Medium => &[("last_72h", 72), ("last_7d", 168)],
        Horizon::Long => &[("last_14d", 336), ("last_30d", 720)],
    }
}

fn daily_span_days(horizon: Horizon) -> i64 {
    match horizon {
        Horizon::Short => 1,
        Horizon::Medium => 7,
        Horizon::Long => 30,
    }
}

/// Reduce one snapshot for one horizon.
///
/// `history` is the shared 2-slot major-event state; the caller holds its
/// lock for the duration of the call (single-writer discipline across
/// concurrently completing horizons).
pub fn reduce(
    horizon: Horizon,
    snapshot: &[QuakeEvent],
    source: FetchSource,
    reference_ms: i64,
    cfg: &ReduceConfig,
    history: &mut MajorEventHistory,
) -> DerivedWindowState {
    let zero = Duration::hours(0);
    let windows: Vec<NamedWindow> = window_layout(horizon)
        .iter()
        .map(|&(name, hours)| NamedWindow {
            name: name.to_string(),
            events: window::select_window(snapshot, Duration::hours(hours), zero, reference_ms),
        })
        .collect();

    // Windows overlap by construction; concatenate then dedupe for every
    // whole-horizon computation.
    let concatenated: Vec<QuakeEvent> = windows.iter().flat_map(|w| w.events.clone()).collect();
    let retained = window::dedupe_by_id(&concatenated);

    let mut map_display = retained.clone();
    map_display.sort_by(|a, b| {
        match (a.valid_magnitude(), b.valid_magnitude()) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id))
    });
    map_display.truncate(cfg.map_display_cap);

    let daily_counts = daily_counts(&retained, reference_ms, daily_span_days(horizon));
    let sample = sample::priority_sample(&retained, cfg.sample_size, cfg.sample_priority_magnitude);
    let histogram = sample::histogram(&retained, &cfg.histogram_ranges);

    let majors: Vec<QuakeEvent> = retained
        .iter()
        .filter(|e| e.valid_magnitude().is_some_and(|m| m >= cfg.major_magnitude))
        .cloned()
        .collect();
    history.consolidate(&majors);

    DerivedWindowState {
        horizon,
        windows,
        map_display,
        daily_counts,
        sample,
        histogram,
        generated_at_ms: reference_ms,
        source,
    }
}

/// Per-UTC-day counts for the trailing `span_days`, oldest day first. Days
/// with no events are present with a zero count.
fn daily_counts(events: &[QuakeEvent], reference_ms: i64, span_days: i64) -> Vec<DailyCount> {
    let reference = DateTime::<Utc>::from_timestamp_millis(reference_ms)
        .unwrap_or_else(Utc::now)
        .date_naive();

    (0..span_days)
        .rev()
        .map(|back| {
            let day = reference - Duration::days(back);
            let count = events
                .iter()
                .filter(|e| {
                    e.valid_time()
                        .and_then(DateTime::<Utc>::from_timestamp_millis)
                        .is_some_and(|t| t.date_naive() == day)
                })
                .count();
            DailyCount {
                date: day.format("%Y-%m-%d").to_string(),
                count,
            }
        })
        .collect()
}
