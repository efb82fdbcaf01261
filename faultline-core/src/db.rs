use crate::config::DatabaseConfig;
use crate::error::FaultlineError;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Connect to PostgreSQL, retrying with exponential backoff so the service
/// can start alongside a database that is still booting.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let retry_strategy = ExponentialBackoff::from_millis(config.connect_retry_delay_ms.max(1))
        .max_delay(Duration::from_secs(10))
        .map(jitter)
        .take(config.connect_retries);

    Retry::spawn(retry_strategy, || async {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Database connection attempt failed");
                e
            })
    })
    .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Create the `errors` table and its timestamp index if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS errors (
            id          TEXT PRIMARY KEY,
            timestamp   TIMESTAMPTZ NOT NULL,
            severity    TEXT NOT NULL DEFAULT 'error',
            context     TEXT NOT NULL,
            name        TEXT,
            message     TEXT NOT NULL,
            stack       TEXT,
            guild_id    TEXT,
            user_id     TEXT,
            command     TEXT,
            meta        TEXT,
            occurrences BIGINT NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS errors_timestamp_idx ON errors (timestamp DESC)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Connect and make sure the schema exists.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, FaultlineError> {
    let pool = create_pool(config).await?;
    ensure_schema(&pool).await?;
    tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
    Ok(pool)
}
