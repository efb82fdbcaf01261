//! Error record persistence.
//!
//! Every backend implements the same upsert contract: the first capture of a
//! fingerprint inserts a row with `occurrences = 1`; later captures bump the
//! counter, refresh `timestamp`, `context` and `meta`, refresh the filter
//! columns only when a new value is supplied, and never touch the failure
//! identity (`name`, `message`, `stack`, `severity`). The read-modify-write
//! must be atomic per fingerprint.

use crate::error::StoreError;
use crate::models::record::ErrorRow;
use crate::models::{ErrorRecord, NewErrorRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait ErrorStore: Send + Sync {
    async fn record_error(&self, record: NewErrorRecord) -> Result<(), StoreError>;

    /// Point lookup. A missing id is `Ok(None)`, not an error.
    async fn get_by_id(&self, id: &str) -> Result<Option<ErrorRecord>, StoreError>;

    /// Most recent first.
    async fn list_latest(&self, limit: u32) -> Result<Vec<ErrorRecord>, StoreError>;

    /// Delete records last seen more than `days` days ago. Returns the number removed.
    async fn prune(&self, days: u32) -> Result<u64, StoreError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

pub(crate) fn prune_cutoff(days: u32) -> DateTime<Utc> {
    Utc::now() - Duration::days(i64::from(days))
}

/// In-process store. The write lock is held across the whole upsert, which
/// gives the same per-key atomicity the SQL backend gets from `ON CONFLICT`.
#[derive(Debug, Clone, Default)]
pub struct MemoryErrorStore {
    rows: Arc<RwLock<HashMap<String, ErrorRow>>>,
}

impl MemoryErrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Insert a raw row as-is. Lets tests plant legacy or malformed data.
    pub async fn insert_raw(&self, row: ErrorRow) {
        self.rows.write().await.insert(row.id.clone(), row);
    }
}

#[async_trait]
impl ErrorStore for MemoryErrorStore {
    async fn record_error(&self, record: NewErrorRecord) -> Result<(), StoreError> {
        let meta = record.meta_text()?;
        let timestamp = record.timestamp.unwrap_or_else(Utc::now);

        let mut rows = self.rows.write().await;
        match rows.get_mut(&record.id) {
            Some(existing) => {
                existing.timestamp = timestamp;
                existing.occurrences += 1;
                existing.meta = meta;
                existing.context = record.context;
                if record.guild_id.is_some() {
                    existing.guild_id = record.guild_id;
                }
                if record.user_id.is_some() {
                    existing.user_id = record.user_id;
                }
                if record.command.is_some() {
                    existing.command = record.command;
                }
            }
            None => {
                let row = ErrorRow {
                    id: record.id.clone(),
                    timestamp,
                    severity: record.severity.unwrap_or_default().as_str().to_string(),
                    context: record.context,
                    name: record.name,
                    message: record.message,
                    stack: record.stack,
                    guild_id: record.guild_id,
                    user_id: record.user_id,
                    command: record.command,
                    meta,
                    occurrences: 1,
                };
                rows.insert(record.id, row);
            }
        }
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ErrorRecord>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(id).cloned().map(ErrorRecord::from))
    }

    async fn list_latest(&self, limit: u32) -> Result<Vec<ErrorRecord>, StoreError> {
        let rows = self.rows.read().await;
        let mut latest: Vec<ErrorRow> = rows.values().cloned().collect();
        latest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        latest.truncate(limit as usize);
        Ok(latest.into_iter().map(ErrorRecord::from).collect())
    }

    async fn prune(&self, days: u32) -> Result<u64, StoreError> {
        let cutoff = prune_cutoff(days);
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| row.timestamp >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
