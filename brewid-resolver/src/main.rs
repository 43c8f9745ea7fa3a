//! brewid-resolver - Label Entity Resolution Service
//!
//! Matches brewery and beer names read off bottle photos against the
//! catalog and runs the human confirmation workflow for uncertain matches.

use anyhow::{Context, Result};
use brewid_common::config::load_config;
use brewid_common::events::EventBus;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use brewid_resolver::services::{ConfirmationWorkflow, MemoryCatalog};
use brewid_resolver::AppState;

/// Interval between expired-session sweeps
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "brewid-resolver", version, about = "Beer label entity resolution service")]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "BREWID_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address from config
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting brewid-resolver");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        keywords = config.keywords.len(),
        max_candidates = config.max_candidates,
        auto_match = config.thresholds.auto_match,
        ambiguity = config.thresholds.ambiguity,
        candidate_floor = config.thresholds.candidate_floor,
        "Resolver configured"
    );

    let catalog = match &config.server.catalog_path {
        Some(path) => MemoryCatalog::from_json_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => {
            warn!("No catalog snapshot configured, starting with an empty catalog");
            MemoryCatalog::default()
        }
    };
    let catalog = Arc::new(catalog);

    let event_bus = EventBus::new(256);
    let workflow = Arc::new(ConfirmationWorkflow::new(
        &config,
        catalog.clone(),
        event_bus.clone(),
    ));

    let sweeper = workflow.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.sweep_expired(Utc::now()).await;
        }
    });

    let state = AppState::new(workflow, catalog, event_bus);
    let app = brewid_resolver::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind = args.bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
