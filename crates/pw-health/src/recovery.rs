//! Recovery record durability
//!
//! Reconnect records and alerts are produced on the live event path. They
//! go through a bounded channel to a single background writer so the
//! producer never waits on the log; a full channel drops the record.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use pw_common::{HealthAlert, ReconnectRecord};

#[async_trait]
pub trait RecoveryLog: Send + Sync {
    async fn insert_reconnect(&self, record: &ReconnectRecord) -> Result<()>;
    async fn insert_alert(&self, alert: &HealthAlert) -> Result<()>;
}

/// Keeps every reconnect record and the most recent alerts
pub struct MemoryRecoveryLog {
    reconnects: Mutex<Vec<ReconnectRecord>>,
    alerts: Mutex<VecDeque<HealthAlert>>,
    alert_retention: usize,
}

impl MemoryRecoveryLog {
    pub fn new(alert_retention: usize) -> Self {
        Self {
            reconnects: Mutex::new(Vec::new()),
            alerts: Mutex::new(VecDeque::new()),
            alert_retention,
        }
    }

    pub fn reconnects(&self) -> Vec<ReconnectRecord> {
        self.reconnects.lock().clone()
    }

    /// Oldest first
    pub fn alerts(&self) -> Vec<HealthAlert> {
        self.alerts.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl RecoveryLog for MemoryRecoveryLog {
    async fn insert_reconnect(&self, record: &ReconnectRecord) -> Result<()> {
        self.reconnects.lock().push(record.clone());
        Ok(())
    }

    async fn insert_alert(&self, alert: &HealthAlert) -> Result<()> {
        let mut alerts = self.alerts.lock();
        alerts.push_back(alert.clone());
        while alerts.len() > self.alert_retention {
            alerts.pop_front();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryEvent {
    Reconnect(ReconnectRecord),
    Alert(HealthAlert),
}

/// Sending half of the recovery writer
#[derive(Clone)]
pub struct RecoveryDispatcher {
    tx: mpsc::Sender<RecoveryEvent>,
    dropped: Arc<AtomicU64>,
}

impl RecoveryDispatcher {
    /// Start the writer task. It runs until every dispatcher clone is dropped.
    pub fn spawn(log: Arc<dyn RecoveryLog>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<RecoveryEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let result = match &event {
                    RecoveryEvent::Reconnect(record) => log.insert_reconnect(record).await,
                    RecoveryEvent::Alert(alert) => log.insert_alert(alert).await,
                };
                if let Err(e) = result {
                    error!(error = %e, event = ?event, "Failed to write recovery event");
                }
            }
            info!("Recovery writer stopped");
        });

        let dispatcher = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (dispatcher, handle)
    }

    /// Never waits. Returns false if the event was dropped.
    pub fn dispatch(&self, event: RecoveryEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                metrics::counter!("pw_recovery_dropped_total").increment(1);
                warn!(event = ?event, "Recovery channel full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                debug!(event = ?event, "Recovery writer gone, dropping event");
                false
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}
