// src/ingest/providers/structured.rs
//! Primary source: the structured quake store. Responses carry a `source`
//! marker and a flat `events` array; the fallback fetcher validates both.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;

use crate::ingest::types::{Horizon, SnapshotSource};

pub struct StructuredStoreProvider {
    base_url: String,
    client: reqwest::Client,
}

impl StructuredStoreProvider {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn url_for(&self, horizon: Horizon) -> String {
        format!(
            "{}/snapshots/{}",
            self.base_url.trim_end_matches('/'),
            horizon.as_str()
        )
    }
}

#[async_trait]
impl SnapshotSource for StructuredStoreProvider {
    async fn fetch_snapshot(&self, horizon: Horizon) -> Result<serde_json::Value> {
        let t0 = std::time::Instant::now();
        let url = self.url_for(horizon);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("requesting structured store at {url}"))?
            .error_for_status()
            .context("structured store returned error status")?;

        let payload = resp
            .json::<serde_json::Value>()
            .await
            .context("decoding structured store body")?;

        histogram!("fetch_primary_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "structured-store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_embed_the_horizon_selector() {
        let p = StructuredStoreProvider::new("http://store.local/api/", reqwest::Client::new());
        assert_eq!(
            p.url_for(Horizon::Medium),
            "http://store.local/api/snapshots/medium"
        );
    }
}
