use crate::models::ErrorMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fatal,
    #[default]
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(Severity::Fatal),
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// One deduplicated failure, keyed by fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    /// Time of the most recent occurrence.
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub context: String,
    pub name: Option<String>,
    pub message: String,
    pub stack: Option<String>,
    pub guild_id: Option<String>,
    pub user_id: Option<String>,
    pub command: Option<String>,
    /// Parsed metadata, or the raw stored string when it is not valid JSON.
    pub meta: Option<serde_json::Value>,
    pub occurrences: i64,
}

impl ErrorRecord {
    /// String value of a top-level metadata key, if present.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.as_ref()?.get(key)?.as_str()
    }
}

/// Input to [`ErrorStore::record_error`](crate::store::ErrorStore::record_error).
#[derive(Debug, Clone, Default)]
pub struct NewErrorRecord {
    pub id: String,
    pub context: String,
    pub message: String,
    pub name: Option<String>,
    pub stack: Option<String>,
    pub meta: Option<ErrorMeta>,
    pub guild_id: Option<String>,
    pub user_id: Option<String>,
    pub command: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub severity: Option<Severity>,
}

impl NewErrorRecord {
    pub fn new(
        id: impl Into<String>,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            context: context.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Attach metadata and lift its well-known keys into the filter columns.
    pub fn with_meta(mut self, meta: ErrorMeta) -> Self {
        self.guild_id = meta.guild_id.clone();
        self.user_id = meta.user_id.clone();
        self.command = meta.command.clone();
        self.meta = Some(meta);
        self
    }

    pub fn meta_text(&self) -> Result<Option<String>, serde_json::Error> {
        self.meta.as_ref().map(serde_json::to_string).transpose()
    }
}

/// Storage shape shared by every backend; `meta` is serialized JSON text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ErrorRow {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: String,
    pub context: String,
    pub name: Option<String>,
    pub message: String,
    pub stack: Option<String>,
    pub guild_id: Option<String>,
    pub user_id: Option<String>,
    pub command: Option<String>,
    pub meta: Option<String>,
    pub occurrences: i64,
}

impl From<ErrorRow> for ErrorRecord {
    fn from(row: ErrorRow) -> Self {
        ErrorRecord {
            severity: row.severity.parse().unwrap_or_default(),
            meta: row.meta.map(|raw| parse_meta(&raw)),
            id: row.id,
            timestamp: row.timestamp,
            context: row.context,
            name: row.name,
            message: row.message,
            stack: row.stack,
            guild_id: row.guild_id,
            user_id: row.user_id,
            command: row.command,
            occurrences: row.occurrences,
        }
    }
}

fn parse_meta(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(meta: Option<&str>, severity: &str) -> ErrorRow {
        ErrorRow {
            id: "abc".to_string(),
            timestamp: Utc::now(),
            severity: severity.to_string(),
            context: "c".to_string(),
            name: None,
            message: "m".to_string(),
            stack: None,
            guild_id: None,
            user_id: None,
            command: None,
            meta: meta.map(str::to_string),
            occurrences: 1,
        }
    }

    #[test]
    fn test_meta_json_is_parsed() {
        let record = ErrorRecord::from(row(Some(r#"{"userId":"u1"}"#), "error"));
        assert_eq!(record.meta_str("userId"), Some("u1"));
    }

    #[test]
    fn test_malformed_meta_falls_back_to_raw_string() {
        let record = ErrorRecord::from(row(Some("not json {"), "error"));
        assert_eq!(record.meta, Some(serde_json::Value::String("not json {".into())));
        assert_eq!(record.meta_str("userId"), None);
    }

    #[test]
    fn test_unknown_severity_reads_as_error() {
        assert_eq!(ErrorRecord::from(row(None, "catastrophic")).severity, Severity::Error);
        assert_eq!(ErrorRecord::from(row(None, "WARN")).severity, Severity::Warning);
    }

    #[test]
    fn test_with_meta_lifts_filter_columns() {
        let meta = ErrorMeta::user("u1").with_guild("g1").with_command("pay");
        let record = NewErrorRecord::new("abc", "command:pay", "boom").with_meta(meta);
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.guild_id.as_deref(), Some("g1"));
        assert_eq!(record.command.as_deref(), Some("pay"));
        assert_eq!(
            record.meta_text().unwrap().as_deref(),
            Some(r#"{"userId":"u1","guildId":"g1","command":"pay"}"#)
        );
    }
}
