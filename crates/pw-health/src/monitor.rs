//! StreamHealthMonitor - liveness of the live event streams
//!
//! Each (shard, category) stream records when it last produced an event.
//! A periodic health check compares the silence against a tolerance that
//! widens with every consecutive failure and on sparsely populated shards.
//! The first event after a failure is a reconnect and gets recorded.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use pw_common::{HealthAlert, ReconnectRecord, ShardId, StreamCategory, StreamHealthEntry};
use pw_config::HealthConfig;

use crate::population::PopulationSource;
use crate::recovery::{RecoveryDispatcher, RecoveryEvent};

type StreamMap = Mutex<HashMap<ShardId, StreamHealthEntry>>;

pub struct StreamHealthMonitor {
    config: HealthConfig,
    population: Arc<dyn PopulationSource>,
    recovery: RecoveryDispatcher,
    primary: StreamMap,
    secondary: StreamMap,
}

impl StreamHealthMonitor {
    pub fn new(config: HealthConfig, population: Arc<dyn PopulationSource>, recovery: RecoveryDispatcher) -> Self {
        Self {
            config,
            population,
            recovery,
            primary: Mutex::new(HashMap::new()),
            secondary: Mutex::new(HashMap::new()),
        }
    }

    fn streams(&self, category: StreamCategory) -> &StreamMap {
        match category {
            StreamCategory::Primary => &self.primary,
            StreamCategory::Secondary => &self.secondary,
        }
    }

    /// Record an event seen on a stream
    pub fn set_event(&self, shard: ShardId, category: StreamCategory, timestamp: DateTime<Utc>) {
        self.set_event_at(shard, category, timestamp, Utc::now());
    }

    pub fn set_event_at(&self, shard: ShardId, category: StreamCategory, timestamp: DateTime<Utc>, now: DateTime<Utc>) {
        let reconnect = {
            let mut streams = self.streams(category).lock();
            let entry = streams
                .entry(shard)
                .or_insert_with(|| StreamHealthEntry::new(shard, category, timestamp));

            let mut reconnect = None;
            if entry.failure_count > 0 {
                if let Some(last) = entry.last_event {
                    reconnect = Some(ReconnectRecord {
                        shard_id: shard,
                        category,
                        duration_without_event_secs: (now - last).num_seconds().max(0),
                        event_count: entry.event_count,
                        failure_count: entry.failure_count,
                        timestamp: now,
                    });
                }
                entry.event_count = 0;
                entry.first_event = timestamp;
            }

            entry.failure_count = 0;
            entry.last_event = Some(timestamp);
            entry.event_count += 1;
            reconnect
        };

        if let Some(record) = reconnect {
            info!(
                shard = record.shard_id,
                category = %category,
                gap_secs = record.duration_without_event_secs,
                failure_count = record.failure_count,
                "Stream reconnected"
            );
            metrics::counter!("pw_stream_reconnects_total", "category" => category.as_str()).increment(1);

            let alert = HealthAlert::for_reconnect(&record, timestamp);
            self.recovery.dispatch(RecoveryEvent::Reconnect(record));
            self.recovery.dispatch(RecoveryEvent::Alert(alert));
        }
    }

    /// Check every monitored shard of `category`.
    ///
    /// Shards that have been silent too long get their failure count bumped.
    /// All shards are evaluated on every call.
    pub fn is_healthy(&self, category: StreamCategory) -> bool {
        self.is_healthy_at(category, Utc::now())
    }

    pub fn is_healthy_at(&self, category: StreamCategory, now: DateTime<Utc>) -> bool {
        let mut healthy = true;
        let mut streams = self.streams(category).lock();

        for (shard, base_tolerance) in self.config.tolerances.monitored(category) {
            let Some(entry) = streams.get_mut(&shard) else {
                continue;
            };
            let Some(elapsed) = entry.seconds_without_event(now) else {
                continue;
            };

            let population = self.population.shard_population(shard);
            let threshold = self.threshold(base_tolerance, entry.failure_count, population);

            if elapsed > i64::try_from(threshold).unwrap_or(i64::MAX) {
                entry.failure_count += 1;
                healthy = false;

                warn!(
                    shard = shard,
                    category = %category,
                    elapsed_secs = elapsed,
                    threshold_secs = threshold,
                    population = ?population,
                    failure_count = entry.failure_count,
                    "Stream has gone quiet"
                );
                metrics::counter!("pw_stream_unhealthy_total", "category" => category.as_str()).increment(1);
            } else {
                debug!(shard = shard, category = %category, elapsed_secs = elapsed, "Stream healthy");
            }
        }

        healthy
    }

    /// Saturates instead of overflowing. An unknown population never widens the threshold.
    fn threshold(&self, base_tolerance: u64, failure_count: u32, population: Option<u32>) -> u64 {
        let padded = failure_count.min(self.config.failure_padding_cap) as u64;
        let mut threshold = base_tolerance
            .saturating_mul(failure_count as u64 + 1)
            .saturating_add(self.config.failure_padding_secs.saturating_mul(padded));

        if population.is_some_and(|p| p < self.config.low_population_threshold) {
            threshold = threshold.saturating_mul(self.config.low_population_multiplier as u64);
        }
        threshold
    }

    /// Entries for `category`, ordered by shard
    pub fn get_health_snapshot(&self, category: StreamCategory) -> Vec<StreamHealthEntry> {
        let mut entries: Vec<_> = self.streams(category).lock().values().cloned().collect();
        entries.sort_by_key(|e| e.shard_id);
        entries
    }

    pub fn entry(&self, shard: ShardId, category: StreamCategory) -> Option<StreamHealthEntry> {
        self.streams(category).lock().get(&shard).cloned()
    }
}
