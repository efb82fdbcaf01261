use clap::Parser;
use faultline_core::FaultlineConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use faultline_server::subsystems::{retention, throttle};
use faultline_server::{server, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "faultline.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match FaultlineConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to DB. Capture keeps working without it, only the tooling goes away.
    let pool = if config.database.enabled {
        match faultline_core::db::connect(&config.database).await {
            Ok(p) => Some(p),
            Err(e) if args.health => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
            Err(e) => {
                tracing::error!("Database unavailable, running log-only: {}", e);
                None
            }
        }
    } else {
        tracing::info!("Database disabled via config, running log-only");
        None
    };

    if args.health {
        match &pool {
            Some(p) => match faultline_core::db::health_check(p).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            },
            None => println!("⚠️  Database disabled"),
        }
        println!("✅ Faultline health check passed");
        return Ok(());
    }

    let state = AppState::from_config(config.clone(), pool);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    tokio::spawn(throttle::run_sweep_loop(
        Arc::clone(state.reporter.throttle()),
        Duration::from_secs(config.throttle.sweep_interval_seconds.max(1)),
        tx.subscribe(),
    ));

    if let Some(store) = state.store() {
        tokio::spawn(retention::run_retention_loop(
            Arc::clone(store),
            config.retention.clone(),
            tx.subscribe(),
        ));
    }

    if config.http.enabled {
        let http_state = state.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = faultline_server::http::start_http_server(http_state, http_shutdown).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, state, tx.subscribe()).await?;

    Ok(())
}
