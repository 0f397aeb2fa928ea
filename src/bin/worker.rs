//! Worker entrypoint.
//!
//! Claims jobs from the document stream one at a time until interrupted with ctrl-c. Any number
//! of workers can share the consumer group as long as their consumer names differ.
use anyhow::{Context, Result};
use clap::Parser;
use pdf_digest::{
    config, connection,
    extraction::StrategySet,
    logging,
    queue::RedisWorkQueue,
    store::RedisJobStore,
    worker::{Worker, WorkerSettings},
};
use std::sync::Arc;
use std::time::Duration;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Parser)]
#[command(
    name = "pdf-digest-worker",
    about = "Process queued PDF extraction jobs"
)]
struct Cli {
    /// Consumer name inside the group (defaults to WORKER_CONSUMER_NAME or `worker-<pid>`).
    #[arg(long)]
    consumer_name: Option<String>,
    /// Upper bound in milliseconds for one blocking stream read.
    #[arg(long)]
    block_timeout_ms: Option<u64>,
    /// Seconds to wait after a failed iteration.
    #[arg(long)]
    retry_backoff_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::load().context("failed to load configuration")?;

    let mut settings = WorkerSettings::from_config(&config);
    if let Some(consumer) = cli.consumer_name {
        settings.consumer = consumer;
    }
    if let Some(ms) = cli.block_timeout_ms {
        settings.block_timeout = Duration::from_millis(ms);
    }
    if let Some(secs) = cli.retry_backoff_secs {
        settings.retry_backoff = Duration::from_secs(secs);
    }

    let store_connection = connection::connect(&config.redis_url)
        .await
        .context("failed to connect job store to Redis")?;
    let queue_connection = connection::connect(&config.redis_url)
        .await
        .context("failed to connect work queue to Redis")?;
    let strategies = StrategySet::from_config(&config.providers)
        .context("failed to initialize remote model clients")?;

    let worker = Worker::new(
        Arc::new(RedisJobStore::new(store_connection)),
        Arc::new(RedisWorkQueue::new(queue_connection)),
        strategies,
        settings,
    );

    let started_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    tracing::info!(
        consumer = %worker.settings().consumer,
        started_at = %started_at,
        "Starting document worker"
    );

    let snapshot = worker
        .run_until(shutdown_signal())
        .await
        .context("worker failed to start")?;
    tracing::info!(
        jobs_done = snapshot.jobs_done,
        jobs_failed = snapshot.jobs_failed,
        "Worker exited"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested; finishing current job");
}
