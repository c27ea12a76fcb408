//! PlanetWatch Worker
//!
//! Keeps the local character cache fresh and watches the live event streams.
//!
//! ## Configuration
//!
//! Read from `PW_CONFIG` (default `planetwatch.toml`), then overridden by
//! `PW_DIRECTORY_URL`, `PW_HEALTH_CHECK_INTERVAL`, `PW_METRICS_ENABLED` and
//! `PW_METRICS_PORT`. Set `PW_LOG_JSON=true` for JSON logs.

use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pw_config::PlanetWatchConfig;
use pw_directory::HttpDirectory;
use pw_health::{
    HealthLifecycle, LoggingReconnector, MemoryRecoveryLog, PopulationRegistry, RecoveryDispatcher,
    StreamHealthMonitor,
};
use pw_queue::UpdateQueue;
use pw_refresh::RefreshWorker;
use pw_store::{LocalStores, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting PlanetWatch worker");

    let config = PlanetWatchConfig::from_env().context("Failed to load configuration")?;

    if config.metrics.enabled {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(port = config.metrics.port, "Prometheus exporter listening");
    }

    // 1. Local cache and upstream directory
    let store = Arc::new(MemoryStore::new());
    let stores = LocalStores::shared(store.clone());
    let directory = Arc::new(HttpDirectory::new(&config.directory).context("Failed to build directory client")?);
    info!(base_url = %config.directory.base_url, "Upstream directory configured");

    // 2. Stream health
    // Live feed logins and logouts are recorded here. Until a shard has
    // been seen its population is unknown and tolerances are not widened.
    let population = Arc::new(PopulationRegistry::new());
    let recovery_log = Arc::new(MemoryRecoveryLog::new(config.health.alert_retention));
    let (dispatcher, recovery_writer) =
        RecoveryDispatcher::spawn(recovery_log.clone(), config.health.recovery_channel_capacity);
    let monitor = Arc::new(StreamHealthMonitor::new(config.health.clone(), population.clone(), dispatcher));

    if config.health.tolerances.is_empty() {
        warn!("No stream tolerances configured, health checks will always pass");
    }
    let lifecycle = HealthLifecycle::start(
        monitor.clone(),
        Arc::new(LoggingReconnector),
        config.health.check_interval(),
    );

    // 3. Refresh worker
    let queue = Arc::new(UpdateQueue::new());
    let worker = Arc::new(RefreshWorker::new(queue.clone(), directory, stores, config.worker.clone()));
    let cancel = CancellationToken::new();
    let worker_handle = {
        let worker = worker.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    info!("PlanetWatch worker started. Press Ctrl+C to shutdown.");

    shutdown_signal().await;
    info!("Shutdown signal received...");

    cancel.cancel();
    queue.close();
    lifecycle.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), worker_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Refresh worker task failed"),
        Err(_) => warn!("Refresh worker did not stop within 30s"),
    }

    // Last monitor reference gone, the recovery writer drains and exits
    drop(monitor);
    if tokio::time::timeout(Duration::from_secs(5), recovery_writer).await.is_err() {
        warn!("Recovery writer did not drain within 5s");
    }

    let stats = worker.stats();
    info!(
        refreshed = stats.refreshed,
        skipped = stats.skipped,
        missed = stats.missed,
        requeued = stats.requeued,
        failed = stats.failed,
        abandoned = queue.len(),
        cached_characters = store.character_count(),
        online = population.online_count(),
        reconnects = recovery_log.reconnects().len(),
        "PlanetWatch worker shutdown complete"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("PW_LOG_JSON")
        .map(|v| v.parse().unwrap_or(false))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
