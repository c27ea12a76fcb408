//! PlanetWatch character refresh
//!
//! - RefreshWorker: single consumer of the update queue that reconciles the
//!   local character cache against the upstream directory
//! - WorkerStats: outcome counters for monitoring

pub mod error;
pub mod stats;
pub mod worker;

pub use error::RefreshError;
pub use stats::{WorkerStats, WorkerStatsSnapshot};
pub use worker::{RefreshOutcome, RefreshWorker};

pub type Result<T> = std::result::Result<T, RefreshError>;
