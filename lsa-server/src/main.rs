//! lsa-server - Live-selling analytics service
//!
//! Tracks live selling sessions, aggregates post-live reports and groups
//! product name variants behind an HTTP API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lsa_common::config::{resolve_root_folder, TomlConfig};
use lsa_common::db::init_database;
use lsa_common::logging::init_logging;
use lsa_common::SystemClock;
use lsa_server::services::{
    HttpProductClassifier, HttpScreenshotExtractor, ProductClassifier, ScreenshotExtractor,
    SimilarityClassifier, SqliteTrainingGate,
};
use lsa_server::{build_router, AppState, Collaborators};
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "lsa-server")]
#[command(about = "Live-selling analytics service")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "LSA_PORT")]
    port: Option<u16>,

    /// Host address to bind (overrides config)
    #[arg(long, env = "LSA_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting lsa-server v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config.database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let classifier: Arc<dyn ProductClassifier> = match &config.classifier.endpoint {
        Some(endpoint) => {
            info!("Product classifier: {}", endpoint);
            Arc::new(HttpProductClassifier::new(endpoint.clone(), &config.classifier)?)
        }
        None => {
            info!("No classifier endpoint configured, using local similarity grouping");
            Arc::new(SimilarityClassifier)
        }
    };

    let extractor: Option<Arc<dyn ScreenshotExtractor>> = match &config.extractor.endpoint {
        Some(endpoint) => {
            info!("Screenshot extractor: {}", endpoint);
            Some(Arc::new(HttpScreenshotExtractor::new(endpoint.clone(), &config.extractor)?))
        }
        None => {
            warn!("No extractor endpoint configured, uploaded screenshots will be ignored");
            None
        }
    };

    let collaborators = Collaborators {
        gate: Arc::new(SqliteTrainingGate::new(pool.clone())),
        classifier,
        classifier_timeout: Duration::from_millis(config.classifier.timeout_ms),
        extractor,
    };

    let state = AppState::new(pool, Arc::new(SystemClock), collaborators, config.reporting.clone());
    let app = build_router(state);

    let host = args.host.unwrap_or_else(|| config.host.clone());
    let port = args.port.unwrap_or(config.port);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("lsa-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
