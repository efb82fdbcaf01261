pub mod config;
pub mod db;
pub mod detail;
pub mod error;
pub mod failure;
pub mod fingerprint;
pub mod ipc;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod pg_store;
pub mod store;

pub use config::FaultlineConfig;
pub use error::{FaultlineError, StoreError};
pub use failure::Failure;
pub use fingerprint::fingerprint;
pub use models::{ErrorMeta, ErrorRecord, NewErrorRecord, Severity};
pub use normalize::StackNormalizer;
pub use notify::{Notification, Notifier, NotifyError, WebhookNotifier};
pub use pg_store::PgErrorStore;
pub use store::{ErrorStore, MemoryErrorStore};
