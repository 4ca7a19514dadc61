//! # Sampler
//! Keeps visualization payloads bounded: priority-biased random sampling that
//! never drops significant events, and magnitude histogram binning.
//!
//! Shortfall policy: events with an unusable magnitude are never priority,
//! but they ARE eligible filler in the "other" pool. A map dot with an
//! unreviewed magnitude is still worth plotting.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::ingest::types::QuakeEvent;

/// `size` events chosen without replacement, uniformly at random; all events
/// when `size >= len`. No order guarantee beyond "unbiased".
pub fn uniform_sample(events: &[QuakeEvent], size: usize) -> Vec<QuakeEvent> {
    if events.len() <= size {
        return events.to_vec();
    }
    let mut rng = rand::rng();
    events.choose_multiple(&mut rng, size).cloned().collect()
}

/// Sample that guarantees inclusion of high-magnitude events first.
///
/// Partition on `magnitude >= threshold`. With enough priority events the
/// result is a uniform sample of priority only; otherwise all priority plus
/// uniform filler from the rest.
pub fn priority_sample(
    events: &[QuakeEvent],
    size: usize,
    magnitude_threshold: f64,
) -> Vec<QuakeEvent> {
    let (priority, other): (Vec<QuakeEvent>, Vec<QuakeEvent>) = events
        .iter()
        .cloned()
        .partition(|e| e.valid_magnitude().is_some_and(|m| m >= magnitude_threshold));

    if priority.len() >= size {
        return uniform_sample(&priority, size);
    }

    let mut out = priority;
    let shortfall = size - out.len();
    out.extend(uniform_sample(&other, shortfall));
    out
}

/// One magnitude bin. `None` bounds are open-ended, so an ordered bucket list
/// with open extremes covers the whole real line. Interval is `[min, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeRange {
    pub label: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl MagnitudeRange {
    pub fn new(label: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self { label: label.into(), min, max }
    }

    fn contains(&self, m: f64) -> bool {
        self.min.is_none_or(|lo| m >= lo) && self.max.is_none_or(|hi| m < hi)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub label: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: usize,
}

/// Count events per magnitude range. Events with an unusable magnitude land
/// in no bucket; the sum of counts equals the number of valid-magnitude
/// inputs as long as `ranges` is exhaustive.
pub fn histogram(events: &[QuakeEvent], ranges: &[MagnitudeRange]) -> Vec<HistogramBucket> {
    let mut buckets: Vec<HistogramBucket> = ranges
        .iter()
        .map(|r| HistogramBucket {
            label: r.label.clone(),
            min: r.min,
            max: r.max,
            count: 0,
        })
        .collect();

    for ev in events {
        let Some(m) = ev.valid_magnitude() else { continue };
        if let Some(idx) = ranges.iter().position(|r| r.contains(m)) {
            buckets[idx].count += 1;
        }
    }
    buckets
}

/// Dashboard default: whole-unit bins with open-ended extremes.
pub fn default_magnitude_ranges() -> Vec<MagnitudeRange> {
    vec![
        MagnitudeRange::new("<1", None, Some(1.0)),
        MagnitudeRange::new("1-2", Some(1.0), Some(2.0)),
        MagnitudeRange::new("2-3", Some(2.0), Some(3.0)),
        MagnitudeRange::new("3-4", Some(3.0), Some(4.0)),
        MagnitudeRange::new("4-5", Some(4.0), Some(5.0)),
        MagnitudeRange::new("5-6", Some(5.0), Some(6.0)),
        MagnitudeRange::new("6-7", Some(6.0), Some(7.0)),
        MagnitudeRange::new("7+", Some(7.0), None),
    ]
}
