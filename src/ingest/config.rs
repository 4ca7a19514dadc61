// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cluster::ClusterParams;
use crate::ingest::types::Horizon;
use crate::reduce::ReduceConfig;

const ENV_PATH: &str = "QUAKEWATCH_CONFIG";
const ENV_CACHE_TTL: &str = "CLUSTER_CACHE_TTL_MS";

/// Service configuration. Every field has a sane default so the service
/// boots with no config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuakewatchConfig {
    /// Structured store base URL (primary source).
    pub primary_base_url: String,
    /// Raw GeoJSON feed base URL (secondary source).
    pub feed_base_url: String,
    pub poll_secs_short: u64,
    pub poll_secs_medium: u64,
    pub poll_secs_long: u64,
    pub request_timeout_secs: u64,
    pub bind_addr: String,
    pub reduce: ReduceConfig,
    pub cluster: ClusterParams,
    pub cluster_cache_ttl_ms: u64,
}

impl Default for QuakewatchConfig {
    fn default() -> Self {
        Self {
            primary_base_url: "http://localhost:9090/api".to_string(),
            feed_base_url: crate::ingest::providers::usgs_feed::DEFAULT_FEED_BASE_URL.to_string(),
            poll_secs_short: 60,
            poll_secs_medium: 300,
            poll_secs_long: 900,
            request_timeout_secs: 10,
            bind_addr: "0.0.0.0:8000".to_string(),
            reduce: ReduceConfig::default(),
            cluster: ClusterParams::default(),
            cluster_cache_ttl_ms: 60_000,
        }
    }
}

impl QuakewatchConfig {
    pub fn poll_secs(&self, horizon: Horizon) -> u64 {
        match horizon {
            Horizon::Short => self.poll_secs_short,
            Horizon::Medium => self.poll_secs_medium,
            Horizon::Long => self.poll_secs_long,
        }
    }

    /// Cache TTL with the env override applied (tests and ops tune this
    /// without touching the config file).
    pub fn effective_cache_ttl_ms(&self) -> u64 {
        std::env::var(ENV_CACHE_TTL)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.cluster_cache_ttl_ms)
    }
}

/// Load from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<QuakewatchConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load using env var + fallbacks:
/// 1) $QUAKEWATCH_CONFIG
/// 2) config/quakewatch.toml
/// 3) config/quakewatch.json
/// 4) built-in defaults
pub fn load_default() -> Result<QuakewatchConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("QUAKEWATCH_CONFIG points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/quakewatch.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/quakewatch.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(QuakewatchConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<QuakewatchConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        if let Ok(v) = serde_json::from_str(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = toml::from_str(s) {
        return Ok(v);
    }
    // Last resort for mislabeled files.
    serde_json::from_str(s).map_err(|_| anyhow!("unsupported config format"))
}
