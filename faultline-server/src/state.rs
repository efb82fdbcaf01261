use crate::subsystems::capture::ErrorReporter;
use crate::subsystems::throttle::NotificationThrottle;
use faultline_core::{
    ErrorStore, FaultlineConfig, Notifier, NotifyError, PgErrorStore, StackNormalizer,
    WebhookNotifier,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Shared by the IPC server, the HTTP API and the background loops.
#[derive(Clone)]
pub struct AppState {
    pub reporter: Arc<ErrorReporter>,
    pub config: FaultlineConfig,
    /// `None` when the database is disabled.
    pub pool: Option<PgPool>,
}

impl AppState {
    /// Wire the reporter from config. A missing pool means log-only mode.
    pub fn from_config(config: FaultlineConfig, pool: Option<PgPool>) -> Self {
        let store: Option<Arc<dyn ErrorStore>> = pool
            .clone()
            .map(|p| Arc::new(PgErrorStore::new(p)) as Arc<dyn ErrorStore>);

        let notifier = match create_notifier(&config) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Operator notifications disabled: {}", e);
                None
            }
        };

        let throttle = Arc::new(NotificationThrottle::from(&config.throttle));
        let normalizer =
            StackNormalizer::with_extra_markers(config.normalizer.extra_noise_markers.clone());
        let reporter = ErrorReporter::new(store, notifier, throttle).with_normalizer(normalizer);

        Self {
            reporter: Arc::new(reporter),
            config,
            pool,
        }
    }

    pub fn with_reporter(reporter: ErrorReporter, config: FaultlineConfig) -> Self {
        Self {
            reporter: Arc::new(reporter),
            config,
            pool: None,
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn ErrorStore>> {
        self.reporter.store()
    }
}

/// Build the webhook notifier, or `None` when no URL is configured.
pub fn create_notifier(config: &FaultlineConfig) -> Result<Option<Arc<dyn Notifier>>, NotifyError> {
    match config.notify.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let notifier =
                WebhookNotifier::new(url, Duration::from_secs(config.notify.timeout_seconds))?;
            Ok(Some(Arc::new(notifier)))
        }
        _ => Ok(None),
    }
}
