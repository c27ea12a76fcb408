//! Health lifecycle - periodic stream checks
//!
//! Runs `is_healthy` for every stream category on an interval and asks the
//! reconnector to restart any category found unhealthy.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use pw_common::StreamCategory;
use crate::monitor::StreamHealthMonitor;

/// Restarts the subscription feeding a stream category
#[async_trait]
pub trait StreamReconnector: Send + Sync {
    async fn reconnect(&self, category: StreamCategory) -> anyhow::Result<()>;
}

/// Reconnector for deployments without a live subscription; only logs
pub struct LoggingReconnector;

#[async_trait]
impl StreamReconnector for LoggingReconnector {
    async fn reconnect(&self, category: StreamCategory) -> anyhow::Result<()> {
        warn!(category = %category, "Stream unhealthy, reconnect requested");
        Ok(())
    }
}

pub struct HealthLifecycle {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl HealthLifecycle {
    /// Start the periodic check task
    pub fn start(
        monitor: Arc<StreamHealthMonitor>,
        reconnector: Arc<dyn StreamReconnector>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut shutdown_rx = shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately, nothing has been observed yet
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        check_streams(&monitor, reconnector.as_ref()).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Stream health checker shutting down");
                        break;
                    }
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "Stream health checker started");

        Self { shutdown_tx, handle }
    }

    /// Signal the check task to stop and wait for it
    pub async fn shutdown(self) {
        info!("Health lifecycle shutting down...");
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            error!(error = %e, "Stream health checker task failed");
        }
    }
}

/// One pass over every category. Returns the categories found unhealthy.
pub async fn check_streams(monitor: &StreamHealthMonitor, reconnector: &dyn StreamReconnector) -> Vec<StreamCategory> {
    let mut unhealthy = Vec::new();

    for category in StreamCategory::ALL {
        if monitor.is_healthy(category) {
            debug!(category = %category, "Stream category healthy");
            continue;
        }

        unhealthy.push(category);
        if let Err(e) = reconnector.reconnect(category).await {
            error!(category = %category, error = %e, "Failed to reconnect stream");
        }
    }

    unhealthy
}
