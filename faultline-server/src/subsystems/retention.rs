//! Scheduled pruning of old error records.
//!
//! Runs only when `[retention] prune_after_days` is set. Operators can also
//! prune on demand through the `prune` request.

use faultline_core::config::RetentionConfig;
use faultline_core::ErrorStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;

/// Prune once, logging the outcome. Returns the number of records removed.
pub async fn run_prune(store: &dyn ErrorStore, days: u32) -> anyhow::Result<u64> {
    let removed = store.prune(days).await?;
    tracing::info!(
        days = days,
        removed = removed,
        store = store.name(),
        "Pruned error records"
    );
    Ok(removed)
}

pub async fn run_retention_loop(
    store: Arc<dyn ErrorStore>,
    config: RetentionConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let Some(days) = config.prune_after_days else {
        tracing::info!("Retention loop disabled via config");
        return;
    };

    let interval = Duration::from_secs(config.interval_hours.max(1) * 3600);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        "Retention loop started (keep {}d, interval: {}h)",
        days,
        config.interval_hours
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_prune(store.as_ref(), days).await {
                    tracing::warn!("Retention prune error (non-fatal): {}", e);
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Retention loop shutting down");
                break;
            }
        }
    }
}
