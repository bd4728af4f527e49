//! mqless runner
//!
//! Entry point with configuration loading, job table setup and the polling worker loop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use mqless_config::Config;
use mqless_jobs::register_all_handlers;
use mqless_runner::cli::{CliArgs, Command};
use mqless_runner::config_helpers::{database_config_from_config, worker_config_from_config};
use mqless_runner::tracing_setup::install_tracing_from_config;
use mqless_runner::{job_from_cli, log_events, poll_until};
use mqless_store_sql::{sanitize_database_url, SqlJobStore};
use mqless_worker::{JobStore, JobWorker, EVENT_CHANNEL_CAPACITY};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config_path = args.resolve_config_path();

    let config = load_config(config_path.as_deref())?;
    install_tracing_from_config(&config.logging)?;
    info!(config_path = ?config_path, "configuration loaded");

    match args.command() {
        Command::Run => run(config).await,
        Command::Enqueue { job_type, payload } => {
            enqueue(&config, job_type, payload.as_deref()).await
        }
    }
}

/// Load and validate configuration from file or defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = mqless_config::load_config(path).context("failed to load configuration")?;
    mqless_config::validate_config(&config).context("invalid configuration")?;
    Ok(config)
}

async fn open_store(config: &Config) -> anyhow::Result<SqlJobStore> {
    let db_cfg = database_config_from_config(config);
    info!(
        db_url = %sanitize_database_url(&db_cfg.url),
        db_max_connections = db_cfg.max_connections,
        app_id = %config.worker.app_id,
        "opening job table"
    );
    SqlJobStore::connect(&db_cfg, &config.worker.app_id)
        .await
        .context("failed to open job store")
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config).await?;

    let mut worker = JobWorker::new(worker_config_from_config(&config), Arc::new(store))?;
    register_all_handlers(&mut worker)?;

    let (running, events) = worker.run_with_events(EVENT_CHANNEL_CAPACITY);
    let event_logger = tokio::spawn(log_events(events));

    let interval = Duration::from_millis(config.poll.interval_ms);
    info!(interval_ms = config.poll.interval_ms, "polling for jobs");
    poll_until(&running, interval, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
        }
    })
    .await;

    info!("shutdown requested; draining dispatched jobs");
    running.shutdown().await;
    event_logger.await.context("event logger task failed")?;
    info!("shutdown complete");
    Ok(())
}

async fn enqueue(config: &Config, job_type: &str, payload: Option<&str>) -> anyhow::Result<()> {
    let job = job_from_cli(job_type, payload)?;
    let store = open_store(config).await?;
    store.put(&job).await.context("failed to enqueue job")?;
    info!(%job_type, "job enqueued");
    Ok(())
}
