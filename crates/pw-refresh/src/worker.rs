//! RefreshWorker - keeps the local character cache in step with upstream
//!
//! Single consumer of the UpdateQueue. Each request is handled in order:
//! - Resolve the character upstream (unless a snapshot came with the request)
//! - Classify as missing, already fresh, or needing a refresh
//! - For a refresh, fetch every stat category concurrently and reconcile
//!   the results into the local stores in a fixed order
//! - Persist the character's metadata
//!
//! Upstream timeouts re-queue the request after a cooldown. Any other
//! failure drops the request and feeds the consecutive-error backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, error, debug};

use pw_common::{CharacterMetadata, CharacterRecord, RefreshRequest, StatBundle, StatCategory};
use pw_config::{CategoryFailurePolicy, WorkerConfig};
use pw_directory::{CharacterDirectory, DirectoryError};
use pw_queue::{QueueError, UpdateQueue};
use pw_store::LocalStores;

use crate::error::RefreshError;
use crate::stats::{WorkerStats, WorkerStatsSnapshot};
use crate::Result;

/// How a single request finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Full refresh reconciled into the local stores
    Refreshed,
    /// Upstream activity predates the last refresh
    Skipped,
    /// Upstream has no such character
    Missed,
    /// Upstream timed out, the request went back on the queue
    Requeued,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::Skipped => "skipped",
            RefreshOutcome::Missed => "missed",
            RefreshOutcome::Requeued => "requeued",
        }
    }

    /// A requeue is neither a success nor a failure
    fn resets_errors(&self) -> bool {
        !matches!(self, RefreshOutcome::Requeued)
    }
}

pub struct RefreshWorker {
    queue: Arc<UpdateQueue>,
    directory: Arc<dyn CharacterDirectory>,
    stores: LocalStores,
    config: WorkerConfig,
    stats: Arc<WorkerStats>,
}

impl RefreshWorker {
    pub fn new(
        queue: Arc<UpdateQueue>,
        directory: Arc<dyn CharacterDirectory>,
        stores: LocalStores,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            directory,
            stores,
            config,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared handle to the counters, for reporting while `run` owns the worker
    pub fn stats_handle(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Drain the queue until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!(policy = ?self.config.category_failure_policy, "Started character refresh worker");

        let mut error_count: u32 = 0;
        let mut completed: u64 = 0;

        while !cancel.is_cancelled() {
            let request = match self.queue.dequeue(&cancel).await {
                Ok(r) => r,
                Err(QueueError::Cancelled) => break,
                Err(QueueError::Closed) => {
                    info!("Update queue closed, stopping worker");
                    break;
                }
            };
            let character_id = request.character_id.clone();

            match self.refresh_one(request, &cancel).await {
                Ok(outcome) => {
                    self.stats.record_outcome(outcome);
                    if outcome.resets_errors() {
                        error_count = 0;
                        self.stats.reset_errors();

                        completed += 1;
                        if self.config.progress_log_interval > 0
                            && completed % self.config.progress_log_interval == 0
                        {
                            debug!(completed = completed, "Cached characters");
                        }
                    }
                }
                Err(RefreshError::Cancelled) => break,
                Err(e) => {
                    error_count += 1;
                    self.stats.record_failure(error_count);
                    error!(
                        character_id = %character_id,
                        error = %e,
                        consecutive_errors = error_count,
                        "Failed to refresh character"
                    );

                    if let Some(delay) = self.config.error_backoff(error_count) {
                        warn!(delay_secs = delay.as_secs(), "Repeated refresh failures, backing off");
                        if !sleep_or_cancel(delay, &cancel).await {
                            break;
                        }
                    }
                }
            }
        }

        info!(remaining = self.queue.len(), "Stopped character refresh worker");
    }

    /// Handle one request. Requeues and cooldown delays happen in here.
    pub async fn refresh_one(&self, request: RefreshRequest, cancel: &CancellationToken) -> Result<RefreshOutcome> {
        let started = Instant::now();
        let character_id = request.character_id.clone();

        let metadata = self.stores.metadata
            .get_metadata(&character_id)
            .await
            .map_err(RefreshError::storage)?;

        let character = match request.snapshot.clone() {
            Some(snapshot) => Some(snapshot),
            None => match self.directory.resolve_character(&character_id).await {
                Ok(c) => c,
                Err(e) if e.is_timeout() => {
                    warn!(
                        character_id = %character_id,
                        error = %e,
                        "Timeout loading character upstream, requeueing"
                    );
                    if !sleep_or_cancel(self.config.timeout_cooldown(), cancel).await {
                        return Err(RefreshError::Cancelled);
                    }
                    self.queue.requeue(request);
                    return Ok(RefreshOutcome::Requeued);
                }
                Err(e) => return Err(e.into()),
            },
        };

        let mut metadata = metadata.unwrap_or_else(|| CharacterMetadata::new(character_id.clone()));

        if cancel.is_cancelled() {
            return Err(RefreshError::Cancelled);
        }

        let outcome = match character {
            None => {
                metadata.not_found_count += 1;
                debug!(
                    character_id = %character_id,
                    not_found_count = metadata.not_found_count,
                    "Character not found upstream"
                );
                RefreshOutcome::Missed
            }
            Some(ref c) if c.last_login < metadata.last_updated && !request.force => {
                metadata.not_found_count = 0;
                RefreshOutcome::Skipped
            }
            Some(c) => {
                metadata.not_found_count = 0;
                metadata.last_updated = Utc::now();

                if let Some(outcome) = self.full_refresh(&request, &c, cancel).await? {
                    return Ok(outcome);
                }
                RefreshOutcome::Refreshed
            }
        };

        self.stores.metadata
            .upsert_metadata(&character_id, &metadata)
            .await
            .map_err(RefreshError::storage)?;

        debug!(
            character_id = %character_id,
            outcome = outcome.as_str(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Character processed"
        );

        Ok(outcome)
    }

    /// Returns `Some(Requeued)` when the fan-out timed out and nothing was written
    async fn full_refresh(
        &self,
        request: &RefreshRequest,
        character: &CharacterRecord,
        cancel: &CancellationToken,
    ) -> Result<Option<RefreshOutcome>> {
        let character_id = character.id.as_str();
        let started = Instant::now();

        self.stores.characters
            .upsert_character(character)
            .await
            .map_err(RefreshError::storage)?;

        let bundle = match self.fetch_bundle(character_id).await {
            Ok(b) => b,
            Err(e) if e.is_timeout() => {
                warn!(character_id = %character_id, error = %e, "Timeout getting stats upstream, requeueing");
                self.queue.requeue(request.clone());
                if !sleep_or_cancel(self.config.fanout_timeout_cooldown(), cancel).await {
                    return Err(RefreshError::Cancelled);
                }
                return Ok(Some(RefreshOutcome::Requeued));
            }
            Err(e) => return Err(e.into()),
        };
        let upstream_ms = started.elapsed().as_millis() as u64;

        let failures = self.reconcile(character_id, &bundle, cancel).await?;

        if failures > 0 && self.config.category_failure_policy == CategoryFailurePolicy::Isolated {
            self.queue.requeue(request.clone());
            return Err(RefreshError::PartialReconcile { failures });
        }

        debug!(
            character_id = %character_id,
            upstream_ms = upstream_ms,
            store_ms = started.elapsed().as_millis() as u64 - upstream_ms,
            isolated_failures = failures,
            "Character stats reconciled"
        );

        Ok(None)
    }

    /// Fetch every category concurrently and wait for all of them.
    /// A timeout on any branch wins over other errors.
    async fn fetch_bundle(&self, character_id: &str) -> std::result::Result<StatBundle, DirectoryError> {
        let d = &self.directory;
        let (weapon_stats, history_stats, items, stats, friends, directives, trees, tiers, objectives) = tokio::join!(
            d.weapon_stats(character_id),
            d.history_stats(character_id),
            d.items(character_id),
            d.stats(character_id),
            d.friends(character_id),
            d.directives(character_id),
            d.directive_trees(character_id),
            d.directive_tiers(character_id),
            d.directive_objectives(character_id),
        );

        let errors: Vec<&DirectoryError> = [
            weapon_stats.as_ref().err(),
            history_stats.as_ref().err(),
            items.as_ref().err(),
            stats.as_ref().err(),
            friends.as_ref().err(),
            directives.as_ref().err(),
            trees.as_ref().err(),
            tiers.as_ref().err(),
            objectives.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if let Some(e) = errors.iter().find(|e| e.is_timeout()).or(errors.first()) {
            return Err((*e).clone());
        }

        Ok(StatBundle {
            weapon_stats: weapon_stats?,
            history_stats: history_stats?,
            items: items?,
            stats: stats?,
            friends: friends?,
            directives: directives?,
            directive_trees: trees?,
            directive_tiers: tiers?,
            directive_objectives: objectives?,
        })
    }

    /// Write the bundle into the local stores in category order.
    /// Returns how many isolated failures were logged and skipped.
    async fn reconcile(&self, character_id: &str, bundle: &StatBundle, cancel: &CancellationToken) -> Result<usize> {
        let stats = &self.stores.stats;
        let mut failures = 0usize;

        for stat in &bundle.weapon_stats {
            let result = stats.upsert_weapon_stat(stat).await;
            self.settle(StatCategory::WeaponStats, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        for stat in &bundle.history_stats {
            let result = stats.upsert_history_stat(character_id, stat).await;
            self.settle(StatCategory::HistoryStats, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        if !bundle.items.is_empty() {
            let result = stats.set_items(character_id, &bundle.items).await;
            self.settle(StatCategory::Items, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        if !bundle.stats.is_empty() {
            let result = stats.set_stats(character_id, &bundle.stats).await;
            self.settle(StatCategory::Stats, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        if !bundle.friends.is_empty() {
            let result = stats.set_friends(character_id, &bundle.friends).await;
            self.settle(StatCategory::Friends, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        for directive in &bundle.directives {
            let result = stats.upsert_directive(character_id, directive).await;
            self.settle(StatCategory::Directives, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        for tree in &bundle.directive_trees {
            let result = stats.upsert_directive_tree(character_id, tree).await;
            self.settle(StatCategory::DirectiveTrees, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        for tier in &bundle.directive_tiers {
            let result = stats.upsert_directive_tier(character_id, tier).await;
            self.settle(StatCategory::DirectiveTiers, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        for objective in &bundle.directive_objectives {
            let result = stats.upsert_directive_objective(character_id, objective).await;
            self.settle(StatCategory::DirectiveObjectives, character_id, result, &mut failures)?;
        }
        check_cancelled(cancel)?;

        Ok(failures)
    }

    fn isolates(&self, category: StatCategory) -> bool {
        match self.config.category_failure_policy {
            CategoryFailurePolicy::Legacy => category.is_directive(),
            CategoryFailurePolicy::Isolated => true,
        }
    }

    /// Log and count an isolated failure, or surface it to the caller
    fn settle(
        &self,
        category: StatCategory,
        character_id: &str,
        result: anyhow::Result<()>,
        failures: &mut usize,
    ) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(error) if self.isolates(category) => {
                error!(
                    character_id = %character_id,
                    category = %category,
                    error = %error,
                    "Error upserting character entry, skipping"
                );
                *failures += 1;
                Ok(())
            }
            Err(error) => Err(RefreshError::CategoryStorage { category, error }),
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(RefreshError::Cancelled)
    } else {
        Ok(())
    }
}

/// False if cancelled before the delay elapsed
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
