use anyhow::{Context, Result};
use pdf_digest::{
    api, config, connection, logging, queue::RedisWorkQueue, service::JobService,
    store::RedisJobStore,
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();
    let config = config::load().context("failed to load configuration")?;

    let connection = connection::connect(&config.redis_url)
        .await
        .context("failed to connect to Redis")?;
    let service = Arc::new(JobService::new(
        Arc::new(RedisJobStore::new(connection.clone())),
        Arc::new(RedisWorkQueue::new(connection)),
        config.document_stream.clone(),
    ));
    let app = api::create_router(service, &config.api_prefix);

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.server_port))
        .await
        .with_context(|| format!("failed to bind port {}", config.server_port))?;
    tracing::info!(
        port = config.server_port,
        prefix = %config.api_prefix,
        "Listening on http://0.0.0.0:{}",
        config.server_port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
