//! End-to-end capture pipeline tests: fingerprint, store, throttled notify.
//!
//! The notifier and failing store are local test doubles; the webhook test
//! runs the real `WebhookNotifier` against a wiremock server.

use async_trait::async_trait;
use faultline_core::{
    ErrorMeta, ErrorRecord, ErrorStore, Failure, MemoryErrorStore, NewErrorRecord, Notification,
    Notifier, NotifyError, StoreError, WebhookNotifier,
};
use faultline_server::subsystems::capture::{CaptureOutcome, ErrorReporter};
use faultline_server::subsystems::throttle::NotificationThrottle;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct FailingStore;

#[async_trait]
impl ErrorStore for FailingStore {
    async fn record_error(&self, _record: NewErrorRecord) -> Result<(), StoreError> {
        Err(StoreError::InvalidArgument("store offline".into()))
    }

    async fn get_by_id(&self, _id: &str) -> Result<Option<ErrorRecord>, StoreError> {
        Err(StoreError::InvalidArgument("store offline".into()))
    }

    async fn list_latest(&self, _limit: u32) -> Result<Vec<ErrorRecord>, StoreError> {
        Err(StoreError::InvalidArgument("store offline".into()))
    }

    async fn prune(&self, _days: u32) -> Result<u64, StoreError> {
        Err(StoreError::InvalidArgument("store offline".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn pipeline() -> (ErrorReporter, MemoryErrorStore, Arc<RecordingNotifier>) {
    let store = MemoryErrorStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let reporter = ErrorReporter::new(
        Some(Arc::new(store.clone())),
        Some(notifier.clone()),
        Arc::new(NotificationThrottle::new(5, Duration::from_secs(60))),
    );
    (reporter, store, notifier)
}

#[tokio::test]
async fn test_repeated_fault_counts_occurrences_and_throttles() {
    let (reporter, store, notifier) = pipeline();
    let failure = Failure::fault("Error", "boom");

    for _ in 0..6 {
        reporter.capture(&failure, "command:pay", None).await;
    }

    let record = store.get_by_id("0aa4671e").await.unwrap().unwrap();
    assert_eq!(record.occurrences, 6);
    assert_eq!(store.len().await, 1);
    assert_eq!(notifier.sent().len(), 5);
}

#[tokio::test]
async fn test_notification_carries_meta() {
    let (reporter, _, notifier) = pipeline();
    let meta = ErrorMeta::user("u1")
        .with_guild("g1")
        .with_channel("c1")
        .with_command("pay");

    reporter
        .capture(&Failure::opaque("timeout"), "button:confirm", Some(meta))
        .await;

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].context_label, "button:confirm");
    assert_eq!(sent[0].user_id.as_deref(), Some("u1"));
    assert_eq!(sent[0].guild_id.as_deref(), Some("g1"));
    assert_eq!(sent[0].channel_id.as_deref(), Some("c1"));
    assert_eq!(sent[0].command.as_deref(), Some("pay"));
}

#[tokio::test]
async fn test_expected_failure_never_notifies() {
    let (reporter, store, notifier) = pipeline();

    for _ in 0..3 {
        let outcome = reporter
            .capture(&Failure::expected("Cooldown active."), "command:daily", None)
            .await;
        assert_eq!(outcome.user_message(), "Cooldown active.");
        assert_eq!(outcome.id(), None);
    }

    assert!(store.is_empty().await);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_store_failure_still_reports_and_notifies() {
    let notifier = Arc::new(RecordingNotifier::default());
    let reporter = ErrorReporter::new(
        Some(Arc::new(FailingStore)),
        Some(notifier.clone()),
        Arc::new(NotificationThrottle::default()),
    );

    let outcome = reporter
        .capture(&Failure::fault("Error", "boom"), "command:pay", None)
        .await;

    assert!(matches!(outcome, CaptureOutcome::Reported(_)));
    assert_eq!(outcome.id(), Some("0aa4671e"));
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_log_only_mode_returns_id() {
    let reporter = ErrorReporter::new(None, None, Arc::new(NotificationThrottle::default()));
    let outcome = reporter
        .capture(&Failure::fault("Error", "boom"), "command:pay", None)
        .await;
    assert_eq!(outcome.id(), Some("0aa4671e"));
}

#[tokio::test]
async fn test_stack_noise_does_not_change_fingerprint() {
    let (reporter, store, _) = pipeline();
    let app_stack = "Error: boom\n    at pay (/app/src/pay.js:10:5)";
    let noisy_stack = format!(
        "{}\n    at process.processTicksAndRejections (node:internal/process/task_queues:95:5)\n    at run (/app/node_modules/lib/index.js:1:1)",
        app_stack
    );

    let a = reporter
        .capture(&Failure::fault("Error", "boom").with_stack(app_stack), "command:pay", None)
        .await;
    let b = reporter
        .capture(&Failure::fault("Error", "boom").with_stack(noisy_stack), "command:pay", None)
        .await;

    assert_eq!(a.id(), Some("3b223a4e"));
    assert_eq!(a.id(), b.id());
    assert_eq!(store.get_by_id("3b223a4e").await.unwrap().unwrap().occurrences, 2);
}

#[tokio::test]
async fn test_webhook_failure_does_not_break_capture() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let notifier =
        WebhookNotifier::new(&format!("{}/hook", server.uri()), Duration::from_secs(5)).unwrap();
    let store = MemoryErrorStore::new();
    let reporter = ErrorReporter::new(
        Some(Arc::new(store.clone())),
        Some(Arc::new(notifier)),
        Arc::new(NotificationThrottle::default()),
    );

    let outcome = reporter
        .capture(&Failure::fault("Error", "boom"), "command:pay", None)
        .await;

    assert_eq!(outcome.id(), Some("0aa4671e"));
    assert_eq!(store.len().await, 1);
}
