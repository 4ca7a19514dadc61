//! # MajorEventTracker
//! Two-slot history of "major" (threshold-exceeding) events, consolidated
//! across successive feed updates. The slots persist across horizons, so the
//! caller serializes access (see the scheduler); this module is pure state.

use serde::{Deserialize, Serialize};

use crate::ingest::types::QuakeEvent;

/// Most-recent and previous major event plus the derived interval between
/// them. `interval_ms` is `None` unless both slots are filled and timed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MajorEventHistory {
    pub most_recent: Option<QuakeEvent>,
    pub previous: Option<QuakeEvent>,
    pub interval_ms: Option<i64>,
}

impl MajorEventHistory {
    /// Merge a fresh batch of qualifying events into the two slots.
    ///
    /// Union of `{most_recent, previous}` and `fresh`, deduplicated by id
    /// with the LAST occurrence winning (fresher data replaces stale copies
    /// of the same event), sorted by time descending, first two kept.
    /// Idempotent under repeated identical input; degrades to fewer slots
    /// when input is sparse. Never errors.
    pub fn consolidate(&mut self, fresh: &[QuakeEvent]) {
        let mut union: Vec<QuakeEvent> = Vec::with_capacity(fresh.len() + 2);
        union.extend(self.most_recent.take());
        union.extend(self.previous.take());
        union.extend(fresh.iter().cloned());

        // Last occurrence wins: walk in reverse, keep first sighting per id.
        let mut seen = std::collections::HashSet::new();
        let mut merged: Vec<QuakeEvent> = union
            .into_iter()
            .rev()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();

        // Newest first; untimed events sink to the end, ids break ties so
        // repeated runs agree.
        merged.sort_by(|a, b| {
            b.valid_time()
                .cmp(&a.valid_time())
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut it = merged.into_iter();
        self.most_recent = it.next();
        self.previous = it.next();
        self.interval_ms = match (&self.most_recent, &self.previous) {
            (Some(mr), Some(prev)) => match (mr.valid_time(), prev.valid_time()) {
                (Some(a), Some(b)) => Some(a - b),
                _ => None,
            },
            _ => None,
        };
    }
}
