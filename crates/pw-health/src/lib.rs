//! PlanetWatch live stream health
//!
//! - StreamHealthMonitor: per shard and category liveness tracking
//! - PopulationRegistry: live population per shard, widens thresholds on quiet shards
//! - RecoveryDispatcher: off-path writer for reconnect records and alerts
//! - HealthLifecycle: periodic checks that trigger stream reconnects

pub mod lifecycle;
pub mod monitor;
pub mod population;
pub mod recovery;

pub use lifecycle::{check_streams, HealthLifecycle, LoggingReconnector, StreamReconnector};
pub use monitor::StreamHealthMonitor;
pub use population::{PopulationRegistry, PopulationSource};
pub use recovery::{MemoryRecoveryLog, RecoveryDispatcher, RecoveryEvent, RecoveryLog};
