// src/ingest/providers/usgs_feed.rs
//! Secondary source: the public raw GeoJSON feed (USGS summary format). Each
//! horizon maps to a feed variant (day/week/month).

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;

use crate::ingest::types::{Horizon, SnapshotSource};

pub const DEFAULT_FEED_BASE_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary";

pub struct RawFeedProvider {
    base_url: String,
    client: reqwest::Client,
}

impl RawFeedProvider {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn url_for(&self, horizon: Horizon) -> String {
        format!(
            "{}/{}.geojson",
            self.base_url.trim_end_matches('/'),
            horizon.feed_selector()
        )
    }
}

#[async_trait]
impl SnapshotSource for RawFeedProvider {
    async fn fetch_snapshot(&self, horizon: Horizon) -> Result<serde_json::Value> {
        let t0 = std::time::Instant::now();
        let url = self.url_for(horizon);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("requesting raw feed at {url}"))?
            .error_for_status()
            .context("raw feed returned error status")?;

        let payload = resp
            .json::<serde_json::Value>()
            .await
            .context("decoding raw feed body")?;

        histogram!("fetch_secondary_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "raw-feed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_use_the_feed_selector_per_horizon() {
        let p = RawFeedProvider::new(DEFAULT_FEED_BASE_URL, reqwest::Client::new());
        assert!(p.url_for(Horizon::Short).ends_with("/all_day.geojson"));
        assert!(p.url_for(Horizon::Medium).ends_with("/all_week.geojson"));
        assert!(p.url_for(Horizon::Long).ends_with("/all_month.geojson"));
    }
}
