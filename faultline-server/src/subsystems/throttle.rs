//! Per-fingerprint notification throttle.
//!
//! Fixed window per fingerprint: at most `limit` notifications are admitted
//! within `window` of the first one; the rest are suppressed until the
//! window expires and the entry resets. State is process-local and lost on
//! restart, which simply resets throttling.
//!
//! Expired entries are reclaimed by an explicit `sweep()`, driven by
//! `run_sweep_loop` on a fixed interval.

use faultline_core::config::ThrottleConfig;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

pub const DEFAULT_LIMIT: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct ThrottleEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug)]
pub struct NotificationThrottle {
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<String, ThrottleEntry>>,
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl From<&ThrottleConfig> for NotificationThrottle {
    fn from(config: &ThrottleConfig) -> Self {
        Self::new(config.limit, Duration::from_secs(config.window_seconds))
    }
}

impl NotificationThrottle {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if a notification for `id` may be sent now.
    pub fn admit(&self, id: &str) -> bool {
        self.admit_at(id, Instant::now())
    }

    pub fn admit_at(&self, id: &str, now: Instant) -> bool {
        let mut entries = self.lock();

        match entries.get_mut(id) {
            Some(entry) if now.saturating_duration_since(entry.window_start) < self.window => {
                entry.count = entry.count.saturating_add(1);
                entry.count <= self.limit
            }
            Some(entry) => {
                *entry = ThrottleEntry {
                    count: 1,
                    window_start: now,
                };
                true
            }
            None => {
                entries.insert(
                    id.to_string(),
                    ThrottleEntry {
                        count: 1,
                        window_start: now,
                    },
                );
                true
            }
        }
    }

    /// Drop entries whose window has expired. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.window_start) < self.window);
        before - entries.len()
    }

    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    // A panic while holding the lock cannot leave an entry half-written,
    // so a poisoned map is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ThrottleEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Periodically sweep expired entries until shutdown.
pub async fn run_sweep_loop(
    throttle: std::sync::Arc<NotificationThrottle>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(interval_secs = interval.as_secs(), "Throttle sweep loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = throttle.sweep();
                if removed > 0 {
                    tracing::debug!(removed = removed, remaining = throttle.tracked(), "Throttle sweep complete");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Throttle sweep loop shutting down");
                break;
            }
        }
    }
}
