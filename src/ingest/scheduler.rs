// src/ingest/scheduler.rs
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::ingest::types::Horizon;
use crate::ingest::IngestContext;

/// Spawn one polling task per horizon. Horizons tick independently and never
/// block each other; within a tick the fallback sequence is sequential.
pub fn spawn_horizon_schedulers(
    ctx: Arc<IngestContext>,
    cfg: &crate::ingest::config::QuakewatchConfig,
) -> Vec<JoinHandle<()>> {
    Horizon::ALL
        .iter()
        .map(|&horizon| spawn_one(ctx.clone(), horizon, cfg.poll_secs(horizon)))
        .collect()
}

fn spawn_one(ctx: Arc<IngestContext>, horizon: Horizon, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            match crate::ingest::run_once(&ctx, horizon).await {
                Ok((source, events)) => {
                    tracing::debug!(
                        horizon = horizon.as_str(),
                        source = ?source,
                        events,
                        "scheduled ingest tick"
                    );
                }
                Err(e) => {
                    // Failure is isolated to this horizon; prior derived
                    // state stays in place until a pass completes.
                    tracing::warn!(horizon = horizon.as_str(), error = %e, "scheduled ingest tick failed");
                }
            }
        }
    })
}
