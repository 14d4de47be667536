use clap::Parser;
use eyre::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reqsmith::api::{self, AppState};
use reqsmith::config::Config;
use reqsmith::dispatch::{DispatchConfig, Dispatcher};
use reqsmith::llm::{OllamaClient, OllamaConfig};
use reqsmith::prompt::PromptCatalog;
use reqsmith::store::JobStore;
use reqsmith::tracker::{JiraTracker, JiraTrackerConfig};

#[derive(Parser)]
#[command(name = "reqsmith", about = "Requirements engineering job service", version)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn setup_logging(level: Option<&str>) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref())?;
    setup_logging(config.log_level.as_deref());

    if let Some(parent) = config.store.db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    let store = JobStore::open(
        &config.store.db_path,
        Duration::from_millis(config.store.busy_timeout_ms),
    )?;
    info!(db = %config.store.db_path.display(), "store opened");

    let catalog = Arc::new(PromptCatalog::from_file(&config.prompts.path)?);
    info!(prompts = %config.prompts.path.display(), models = catalog.model_names().len(), "prompt catalog loaded");

    let inference = Arc::new(OllamaClient::new(OllamaConfig {
        base_url: config.llm.base_url.clone(),
        timeout: Duration::from_millis(config.llm.timeout_ms),
    })?);
    let tracker = Arc::new(JiraTracker::new(JiraTrackerConfig {
        timeout: Duration::from_millis(config.tracker.timeout_ms),
    })?);

    let dispatcher = Dispatcher::new(
        store.clone(),
        catalog.clone(),
        inference,
        tracker,
        DispatchConfig {
            poll_interval: Duration::from_millis(config.dispatch.poll_interval_ms),
            sync_delay: Duration::from_millis(config.dispatch.sync_delay_ms),
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatch_task = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

    let app = api::router(AppState { store, catalog });
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .context(format!("Failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "serving API");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    dispatch_task.await.context("Dispatcher task panicked")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
