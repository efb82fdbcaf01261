//! faultline-cli: operator frontend for captured error records
//!
//! Talks to the Faultline HTTP API. Support staff paste the 8-character id a
//! user reported and get the stored record back.
//!
//! # Subcommands
//! - `status`: show server health
//! - `lookup <id> [--json]`: show one record in detail
//! - `latest [-n <limit>] [--json]`: list the most recent records
//! - `prune --days <n>`: delete records older than n days
//! - `test`: capture a synthetic error end to end

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";
const DEFAULT_LIMIT: u32 = 10;
const LIST_MESSAGE_WIDTH: usize = 60;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "faultline-cli", version, about = "Inspect errors captured by Faultline")]
struct Cli {
    /// Faultline HTTP server URL (overrides FAULTLINE_HTTP_URL env var)
    #[arg(long, env = "FAULTLINE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show Faultline server status
    Status,

    /// Look up a captured error by id
    Lookup {
        /// The 8-character error id
        id: String,

        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the most recently seen errors
    Latest {
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// Print the records as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Delete records last seen more than N days ago
    Prune {
        #[arg(long)]
        days: u32,
    },

    /// Capture a synthetic error through the full pipeline
    Test,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RecordView {
    pub id: String,
    pub timestamp: String,
    pub context: String,
    pub message: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub occurrences: i64,
}

#[derive(Debug, Deserialize)]
pub struct LatestResponse {
    pub count: usize,
    pub errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    pub record: serde_json::Value,
    pub detail: String,
}

/// One line of the `latest` listing.
pub fn format_row(r: &RecordView) -> String {
    let first_line = r.message.lines().next().unwrap_or("");
    let mut message: String = first_line.chars().take(LIST_MESSAGE_WIDTH).collect();
    if first_line.chars().count() > LIST_MESSAGE_WIDTH {
        message.push_str("...");
    }
    format!(
        "{}  {}  x{:<4} {}  {}",
        r.id, r.timestamp, r.occurrences, r.context, message
    )
}

/// Error body of a non-2xx response, falling back to the raw text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?)
}

/// Send a request and return the parsed JSON body, exiting on transport or
/// server errors.
fn send(req: reqwest::blocking::RequestBuilder, url: &str) -> serde_json::Value {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("faultline-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    if !status.is_success() {
        eprintln!("faultline-cli: {} (HTTP {})", error_message(&body), status);
        std::process::exit(1);
    }

    match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("faultline-cli: failed to parse response: {}", e);
            std::process::exit(1);
        }
    }
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let body = send(client()?.get(&url), &url);

    println!("Faultline server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:          {}", body["version"].as_str().unwrap_or("?"));
    println!("PostgreSQL:       {}", body["postgresql"].as_str().unwrap_or("?"));
    println!("Socket:           {}", body["socket"].as_str().unwrap_or("?"));
    println!("Throttled ids:    {}", body["throttle_tracked"].as_u64().unwrap_or(0));
    Ok(())
}

fn do_lookup(server: &str, id: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/errors/{}", server, id.trim());
    let body = send(client()?.get(&url), &url);
    let lookup: LookupResponse = serde_json::from_value(body)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&lookup.record)?);
    } else {
        println!("{}", lookup.detail);
    }
    Ok(())
}

fn do_latest(server: &str, limit: u32, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/errors?limit={}", server, limit);
    let body = send(client()?.get(&url), &url);
    let latest: LatestResponse = serde_json::from_value(body)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&latest.errors)?);
        return Ok(());
    }

    if latest.count == 0 {
        eprintln!("No errors recorded.");
        return Ok(());
    }
    for raw in latest.errors {
        let row: RecordView = serde_json::from_value(raw)?;
        println!("{}", format_row(&row));
    }
    Ok(())
}

fn do_prune(server: &str, days: u32) -> anyhow::Result<()> {
    let url = format!("{}/prune", server);
    let body = send(
        client()?.post(&url).json(&serde_json::json!({ "days": days })),
        &url,
    );
    println!(
        "Removed {} record(s) older than {} day(s)",
        body["removed"].as_u64().unwrap_or(0),
        days
    );
    Ok(())
}

fn do_test(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/errors/test", server);
    let body = send(client()?.post(&url).json(&serde_json::json!({})), &url);
    println!(
        "Synthetic error captured with ID {}",
        body["id"].as_str().unwrap_or("?")
    );
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Status => do_status(&server),
        Commands::Lookup { id, json } => do_lookup(&server, &id, json),
        Commands::Latest { limit, json } => do_latest(&server, limit, json),
        Commands::Prune { days } => do_prune(&server, days),
        Commands::Test => do_test(&server),
    };

    if let Err(e) = result {
        eprintln!("faultline-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
