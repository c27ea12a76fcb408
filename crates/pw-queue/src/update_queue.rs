//! UpdateQueue - deduplicating, order-preserving character refresh queue
//!
//! Producers never block. The single consumer waits on a counting semaphore
//! that receives exactly one permit per queued request, so a dequeue racing
//! an enqueue cannot miss its wakeup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pw_common::{CharacterId, CharacterRecord, RefreshRequest};
use crate::pending::PendingSet;
use crate::{QueueError, Result};

#[derive(Debug, Default)]
struct QueueState {
    pending: PendingSet,
    items: VecDeque<RefreshRequest>,
}

/// FIFO of refresh requests with at most one request per character
pub struct UpdateQueue {
    state: Mutex<QueueState>,

    /// One permit per queued request
    signal: Semaphore,

    processed: AtomicU64,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            signal: Semaphore::new(0),
            processed: AtomicU64::new(0),
        }
    }

    /// Queue a character for refresh. No-op if it is already pending.
    pub fn enqueue(&self, character_id: impl Into<CharacterId>) -> bool {
        self.push(RefreshRequest::new(character_id))
    }

    /// Queue a character using an already fetched upstream record
    pub fn enqueue_snapshot(&self, character: CharacterRecord) -> bool {
        self.push(RefreshRequest::with_snapshot(character))
    }

    /// Queue a character that is refreshed even if its cache looks fresh
    pub fn enqueue_forced(&self, character_id: impl Into<CharacterId>) -> bool {
        self.push(RefreshRequest::forced(character_id))
    }

    /// Put a previously dequeued request back, snapshot and force flag intact
    pub fn requeue(&self, request: RefreshRequest) -> bool {
        self.push(request)
    }

    fn push(&self, request: RefreshRequest) -> bool {
        if self.signal.is_closed() {
            debug!(character_id = %request.character_id, "Not queueing, queue closed");
            return false;
        }

        let depth = {
            let mut state = self.state.lock();
            if !state.pending.insert(&request.character_id) {
                debug!(character_id = %request.character_id, "Not queueing, already pending");
                metrics::counter!("pw_queue_deduplicated_total").increment(1);
                return false;
            }
            state.items.push_back(request);
            state.items.len()
        };

        self.signal.add_permits(1);

        metrics::counter!("pw_queue_enqueued_total").increment(1);
        metrics::gauge!("pw_queue_depth").set(depth as f64);
        true
    }

    /// Wait for the next request, or fail with `Cancelled` once `cancel` fires.
    ///
    /// The character leaves the pending set in the same critical section
    /// that pops it, so it can be queued again as soon as this returns.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<RefreshRequest> {
        loop {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                permit = self.signal.acquire() => permit.map_err(|_| QueueError::Closed)?,
            };
            permit.forget();

            let popped = {
                let mut state = self.state.lock();
                let request = state.items.pop_front();
                if let Some(ref request) = request {
                    state.pending.remove(&request.character_id);
                }
                request.map(|r| (r, state.items.len()))
            };

            if let Some((request, depth)) = popped {
                self.processed.fetch_add(1, Ordering::SeqCst);
                metrics::gauge!("pw_queue_depth").set(depth as f64);
                return Ok(request);
            }
        }
    }

    /// Stop accepting requests and wake the consumer with `Closed`.
    /// Requests still queued are abandoned.
    pub fn close(&self) {
        self.signal.close();
        debug!(abandoned = self.len(), "Update queue closed");
    }

    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    /// Number of requests waiting to be dequeued
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total requests handed to the consumer
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self, character_id: &str) -> bool {
        self.state.lock().pending.contains(character_id)
    }
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}
