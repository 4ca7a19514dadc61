//! Quakewatch — Binary Entrypoint
//! Boots the Axum HTTP server, wires the per-horizon ingest schedulers, and
//! exposes Prometheus metrics.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quakewatch::api::{self, AppState};
use quakewatch::ingest::config;
use quakewatch::ingest::fallback::SourceFallbackFetcher;
use quakewatch::ingest::providers::structured::StructuredStoreProvider;
use quakewatch::ingest::providers::usgs_feed::RawFeedProvider;
use quakewatch::ingest::scheduler::spawn_horizon_schedulers;
use quakewatch::ingest::IngestContext;
use quakewatch::metrics::Metrics;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quakewatch=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default().context("loading configuration")?;
    tracing::info!(
        primary = %cfg.primary_base_url,
        feed = %cfg.feed_base_url,
        "quakewatch starting"
    );

    // Fetch calls are bounded by this client-level timeout.
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
        .build()
        .context("building http client")?;

    let fetcher = SourceFallbackFetcher::new(
        Arc::new(StructuredStoreProvider::new(
            cfg.primary_base_url.clone(),
            client.clone(),
        )),
        Arc::new(RawFeedProvider::new(cfg.feed_base_url.clone(), client)),
    );

    let state = AppState::new(&cfg);
    let ctx = Arc::new(IngestContext {
        fetcher,
        reduce_cfg: cfg.reduce.clone(),
        derived: state.derived_handle(),
        major: state.major_handle(),
        last_errors: state.last_errors_handle(),
    });
    let _handles = spawn_horizon_schedulers(ctx, &cfg);

    let metrics = Metrics::init(cfg.effective_cache_ttl_ms());
    let router = api::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, router).await.context("serving http")?;

    Ok(())
}
