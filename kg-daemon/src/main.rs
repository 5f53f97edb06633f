//! KG Daemon - knowledge-graph construction orchestrator.
//!
//! A single Rust binary that provides:
//! - HTTP API to validate HDFS sources and start/stop constructions
//! - Construction metadata and progress queries
//! - WebSocket for live construction events

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use kg_daemon::backend::RemoteBackend;
use kg_daemon::config::DaemonConfig;
use kg_daemon::hdfs::{HdfsValidator, WebHdfsClient};
use kg_daemon::orchestrator::Orchestrator;
use kg_daemon::server::{create_router, AppState};
use kg_daemon::storage::MetaStore;

/// Knowledge-graph construction daemon
#[derive(Parser, Debug)]
#[command(name = "kgd")]
#[command(about = "Knowledge-graph construction orchestrator for HDFS-staged data")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "kgd.toml")]
    config: PathBuf,

    /// HTTP port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the metadata database (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut config = DaemonConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db) = cli.db {
        config.storage.path = db;
    }

    info!("Database: {:?}", config.storage.path);
    let store = Arc::new(
        MetaStore::open(&config.storage.path).context("Failed to open metadata store")?,
    );

    let webhdfs = WebHdfsClient::new(config.probe_timeout(), config.hdfs.webhdfs_port)?;
    let validator = Arc::new(HdfsValidator::new(webhdfs.clone(), config.probe_timeout()));
    let backend = Arc::new(RemoteBackend::new(
        config.cluster_urls(),
        config.poll_interval(),
        config.request_timeout(),
    )?);
    if config.clusters.is_empty() {
        tracing::warn!("No clusters configured; constructions will fail at dispatch");
    }

    let orchestrator = Arc::new(Orchestrator::new(store, validator.clone(), backend));
    let recovered = orchestrator.recover_interrupted()?;
    if recovered > 0 {
        info!("Marked {} interrupted constructions as failed", recovered);
    }

    let state = AppState::new(orchestrator, validator, webhdfs, config.cluster_ids());
    let router = create_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("KG daemon listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("KG daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
