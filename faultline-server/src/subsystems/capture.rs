//! Capture orchestrator.
//!
//! `ErrorReporter::capture` is the single entry point for failures raised by
//! request handlers. It fingerprints the failure, logs it, records it in the
//! store when one is configured, and forwards a throttled notification to
//! the operator channel. Every stage after fingerprinting is best effort: a
//! store or notifier failure is logged and the caller still gets its id.
//!
//! Expected failures skip all of this and only carry their message back.

use crate::subsystems::throttle::NotificationThrottle;
use faultline_core::fingerprint::fingerprint_with;
use faultline_core::{
    ErrorMeta, ErrorStore, Failure, NewErrorRecord, Notification, Notifier, NotifyError,
    StackNormalizer, StoreError,
};
use serde::Serialize;
use std::sync::Arc;

pub const SYNTHETIC_CONTEXT: &str = "manual-test";
pub const SYNTHETIC_MESSAGE: &str = "Synthetic error from errors test";

/// What the caller shows the end user for a captured fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub id: String,
    pub user_message: String,
}

impl ErrorReport {
    fn new(id: String) -> Self {
        let user_message = format!(
            "An unexpected error occurred. Please report this ID to the support team: **{}**",
            id
        );
        Self { id, user_message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureOutcome {
    Reported(ErrorReport),
    Expected { message: String },
}

impl CaptureOutcome {
    pub fn id(&self) -> Option<&str> {
        match self {
            CaptureOutcome::Reported(report) => Some(&report.id),
            CaptureOutcome::Expected { .. } => None,
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            CaptureOutcome::Reported(report) => &report.user_message,
            CaptureOutcome::Expected { message } => message,
        }
    }
}

/// Result of the notification stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Sent,
    Throttled,
    /// No notifier configured.
    Disabled,
}

/// Display payload derived from a fault.
struct Payload {
    name: Option<String>,
    message: String,
    stack: Option<String>,
}

pub struct ErrorReporter {
    store: Option<Arc<dyn ErrorStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    throttle: Arc<NotificationThrottle>,
    normalizer: StackNormalizer,
}

impl ErrorReporter {
    pub fn new(
        store: Option<Arc<dyn ErrorStore>>,
        notifier: Option<Arc<dyn Notifier>>,
        throttle: Arc<NotificationThrottle>,
    ) -> Self {
        Self {
            store,
            notifier,
            throttle,
            normalizer: StackNormalizer::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: StackNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn store(&self) -> Option<&Arc<dyn ErrorStore>> {
        self.store.as_ref()
    }

    pub fn throttle(&self) -> &Arc<NotificationThrottle> {
        &self.throttle
    }

    pub async fn capture(
        &self,
        failure: &Failure,
        context_label: &str,
        meta: Option<ErrorMeta>,
    ) -> CaptureOutcome {
        if let Failure::Expected { message } = failure {
            tracing::debug!(context = context_label, "Expected failure, not captured");
            return CaptureOutcome::Expected {
                message: message.clone(),
            };
        }

        let id = fingerprint_with(&self.normalizer, failure, context_label);
        let payload = self.payload(failure);

        tracing::error!(
            id = %id,
            context = context_label,
            name = payload.name.as_deref().unwrap_or("-"),
            error_message = %payload.message,
            user_id = meta.as_ref().and_then(|m| m.user_id.as_deref()).unwrap_or("-"),
            guild_id = meta.as_ref().and_then(|m| m.guild_id.as_deref()).unwrap_or("-"),
            command = meta.as_ref().and_then(|m| m.command.as_deref()).unwrap_or("-"),
            stack = payload.stack.as_deref().unwrap_or(""),
            "Error captured ({})",
            context_label
        );

        let notification = Notification {
            id: id.clone(),
            context_label: context_label.to_string(),
            user_id: meta.as_ref().and_then(|m| m.user_id.clone()),
            command: meta.as_ref().and_then(|m| m.command.clone()),
            guild_id: meta.as_ref().and_then(|m| m.guild_id.clone()),
            channel_id: meta.as_ref().and_then(|m| m.channel_id.clone()),
        };

        if let Err(e) = self.persist(&id, context_label, payload, meta).await {
            tracing::error!(id = %id, error = %e, "Failed to persist captured error");
        }

        match self.notify(&notification).await {
            Ok(Dispatch::Sent | Dispatch::Disabled) => {}
            Ok(Dispatch::Throttled) => {
                tracing::warn!(id = %id, "Throttled operator notification for ID {}", id);
            }
            Err(e) => {
                tracing::error!(id = %id, error = %e, "Failed to dispatch error notification");
            }
        }

        CaptureOutcome::Reported(ErrorReport::new(id))
    }

    /// Run a synthetic fault through the full pipeline.
    pub async fn capture_synthetic(&self, meta: Option<ErrorMeta>) -> CaptureOutcome {
        let failure = Failure::fault("Error", SYNTHETIC_MESSAGE);
        self.capture(&failure, SYNTHETIC_CONTEXT, meta).await
    }

    fn payload(&self, failure: &Failure) -> Payload {
        match failure {
            Failure::Fault { name, message, .. } => Payload {
                name: Some(name.clone()),
                message: message.clone(),
                stack: failure.stack().map(|s| self.normalizer.normalize(s)),
            },
            other => Payload {
                name: None,
                message: other.message().to_string(),
                stack: None,
            },
        }
    }

    async fn persist(
        &self,
        id: &str,
        context_label: &str,
        payload: Payload,
        meta: Option<ErrorMeta>,
    ) -> Result<(), StoreError> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let mut record = NewErrorRecord {
            name: payload.name,
            stack: payload.stack,
            ..NewErrorRecord::new(id, context_label, payload.message)
        };
        if let Some(meta) = meta {
            record = record.with_meta(meta);
        }

        store.record_error(record).await
    }

    async fn notify(&self, notification: &Notification) -> Result<Dispatch, NotifyError> {
        let Some(notifier) = &self.notifier else {
            return Ok(Dispatch::Disabled);
        };

        if !self.throttle.admit(&notification.id) {
            return Ok(Dispatch::Throttled);
        }

        notifier.notify(notification).await?;
        Ok(Dispatch::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::MemoryErrorStore;

    fn reporter_with_store() -> (ErrorReporter, MemoryErrorStore) {
        let store = MemoryErrorStore::new();
        let reporter = ErrorReporter::new(
            Some(Arc::new(store.clone())),
            None,
            Arc::new(NotificationThrottle::default()),
        );
        (reporter, store)
    }

    #[tokio::test]
    async fn test_capture_returns_fingerprint_and_message() {
        let (reporter, _) = reporter_with_store();
        let outcome = reporter
            .capture(&Failure::fault("Error", "boom"), "command:pay", None)
            .await;

        assert_eq!(outcome.id(), Some("0aa4671e"));
        assert_eq!(
            outcome.user_message(),
            "An unexpected error occurred. Please report this ID to the support team: **0aa4671e**"
        );
    }

    #[tokio::test]
    async fn test_capture_stores_normalized_stack() {
        let (reporter, store) = reporter_with_store();
        let failure = Failure::fault("TypeError", "x is undefined").with_stack(
            "TypeError: x is undefined\n    at pay (/app/src/pay.js:1:1)\n    at tick (node:internal/process/task_queues:95:5)",
        );
        let outcome = reporter.capture(&failure, "command:pay", None).await;

        let record = store.get_by_id(outcome.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(record.name.as_deref(), Some("TypeError"));
        assert_eq!(
            record.stack.as_deref(),
            Some("TypeError: x is undefined\n    at pay (/app/src/pay.js:1:1)")
        );
    }

    #[tokio::test]
    async fn test_opaque_failure_has_no_name() {
        let (reporter, store) = reporter_with_store();
        let outcome = reporter.capture(&Failure::opaque("42"), "button:x", None).await;
        let record = store.get_by_id(outcome.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(record.name, None);
        assert_eq!(record.message, "42");
    }

    #[tokio::test]
    async fn test_expected_failure_is_not_recorded() {
        let (reporter, store) = reporter_with_store();
        let outcome = reporter
            .capture(&Failure::expected("Not enough funds."), "command:pay", None)
            .await;

        assert_eq!(
            outcome,
            CaptureOutcome::Expected {
                message: "Not enough funds.".to_string()
            }
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_synthetic_capture_uses_manual_test_context() {
        let (reporter, store) = reporter_with_store();
        let outcome = reporter.capture_synthetic(Some(ErrorMeta::user("dev"))).await;
        let record = store.get_by_id(outcome.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(record.context, SYNTHETIC_CONTEXT);
        assert_eq!(record.message, SYNTHETIC_MESSAGE);
        assert_eq!(record.user_id.as_deref(), Some("dev"));
    }
}
