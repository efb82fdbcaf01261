//! PostgreSQL-backed [`ErrorStore`].
//!
//! The upsert is a single `INSERT ... ON CONFLICT (id) DO UPDATE` statement,
//! so concurrent captures of one fingerprint serialize on the row inside
//! PostgreSQL and no application lock is needed.

use crate::error::StoreError;
use crate::models::record::ErrorRow;
use crate::models::{ErrorRecord, NewErrorRecord};
use crate::store::{prune_cutoff, ErrorStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

const SELECT_COLUMNS: &str = "id, timestamp, severity, context, name, message, stack, \
                              guild_id, user_id, command, meta, occurrences";

#[derive(Debug, Clone)]
pub struct PgErrorStore {
    pool: PgPool,
}

impl PgErrorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ErrorStore for PgErrorStore {
    async fn record_error(&self, record: NewErrorRecord) -> Result<(), StoreError> {
        let meta = record.meta_text()?;
        let timestamp = record.timestamp.unwrap_or_else(Utc::now);
        let severity = record.severity.unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO errors
                (id, timestamp, severity, context, name, message, stack,
                 guild_id, user_id, command, meta, occurrences)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 1)
            ON CONFLICT (id) DO UPDATE SET
                timestamp   = EXCLUDED.timestamp,
                occurrences = errors.occurrences + 1,
                meta        = EXCLUDED.meta,
                context     = EXCLUDED.context,
                guild_id    = COALESCE(EXCLUDED.guild_id, errors.guild_id),
                user_id     = COALESCE(EXCLUDED.user_id, errors.user_id),
                command     = COALESCE(EXCLUDED.command, errors.command)
            "#,
        )
        .bind(&record.id)
        .bind(timestamp)
        .bind(severity.as_str())
        .bind(&record.context)
        .bind(&record.name)
        .bind(&record.message)
        .bind(&record.stack)
        .bind(&record.guild_id)
        .bind(&record.user_id)
        .bind(&record.command)
        .bind(meta)
        .execute(&self.pool)
        .await?;

        tracing::debug!(id = %record.id, "Recorded error occurrence");
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ErrorRecord>, StoreError> {
        let row: Option<ErrorRow> =
            sqlx::query_as(&format!("SELECT {} FROM errors WHERE id = $1", SELECT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ErrorRecord::from))
    }

    async fn list_latest(&self, limit: u32) -> Result<Vec<ErrorRecord>, StoreError> {
        let rows: Vec<ErrorRow> = sqlx::query_as(&format!(
            "SELECT {} FROM errors ORDER BY timestamp DESC LIMIT $1",
            SELECT_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ErrorRecord::from).collect())
    }

    async fn prune(&self, days: u32) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM errors WHERE timestamp < $1")
            .bind(prune_cutoff(days))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
