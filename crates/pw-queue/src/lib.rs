//! PlanetWatch character update queue
//!
//! - PendingSet: membership set enforcing one outstanding request per character
//! - UpdateQueue: deduplicating FIFO with a single blocking consumer

pub mod pending;
pub mod update_queue;

pub use pending::PendingSet;
pub use update_queue::UpdateQueue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Dequeue cancelled")]
    Cancelled,

    #[error("Queue closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;
