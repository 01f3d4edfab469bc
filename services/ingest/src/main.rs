//! Ingest API binary.
//!
//! Wires the SSM-backed credential cache, the validator, and the SQS
//! producer into the HTTP API, and serves until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use mailpipe_ingest::{
    start_api_server, AppState, CredentialCache, IngestConfig, Producer, SsmParameterStore,
    Validator,
};
use mailpipe_pipeline::SqsQueue;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = IngestConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.service.log_level);

    config.validate().context("Invalid configuration")?;

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        queue_url = %config.queue.queue_url,
        "Starting ingest API"
    );

    let metrics = init_metrics()?;

    let sdk_config = config.aws.load_sdk_config().await;
    let parameter_store = Arc::new(SsmParameterStore::new(&sdk_config));
    let credentials = Arc::new(CredentialCache::with_ttl(
        parameter_store,
        config.auth.token_parameter.clone(),
        config.auth.cache_ttl(),
    ));

    let queue = Arc::new(SqsQueue::new(&config.aws, &config.queue).await);
    let producer = Arc::new(Producer::new(Validator::new(credentials), queue));

    let state = AppState {
        producer,
        metrics: Some(metrics),
    };

    start_api_server(state, &config.api, shutdown_signal()).await?;

    info!("Ingest API stopped");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Install the Prometheus recorder; the handle is rendered at `/metrics`
fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Prometheus recorder installed");
    Ok(handle)
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
