//! PlanetWatch configuration
//!
//! Loaded from a TOML file (missing file means defaults), then selected
//! fields are overridden from the environment.

use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pw_common::{ShardId, StreamCategory};

pub const DEFAULT_CONFIG_PATH: &str = "planetwatch.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Top-level Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetWatchConfig {
    pub worker: WorkerConfig,
    pub health: HealthConfig,
    pub directory: DirectoryConfig,
    pub metrics: MetricsConfig,
}

impl PlanetWatchConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        info!(
            path = %path.display(),
            tolerances = config.health.tolerances.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from `PW_CONFIG` (or the default path) and apply environment overrides
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("PW_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PW_DIRECTORY_URL") {
            self.directory.base_url = url;
        }
        if let Some(v) = lookup("PW_HEALTH_CHECK_INTERVAL") {
            self.health.check_interval_secs = parse_value("PW_HEALTH_CHECK_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("PW_METRICS_ENABLED") {
            self.metrics.enabled = parse_value("PW_METRICS_ENABLED", &v)?;
        }
        if let Some(v) = lookup("PW_METRICS_PORT") {
            self.metrics.port = parse_value("PW_METRICS_PORT", &v)?;
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

// ============================================================================
// Worker
// ============================================================================

/// How category upsert failures during reconciliation are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFailurePolicy {
    /// Directive hierarchy upserts are isolated per entry, every other
    /// category failure aborts the iteration and the request is dropped
    #[default]
    Legacy,
    /// Every entry of every category is isolated; any failure re-enqueues the request
    Isolated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Delay after a timeout while resolving the character
    pub timeout_cooldown_secs: u64,
    /// Delay after a timeout during the category fan-out
    pub fanout_timeout_cooldown_secs: u64,
    /// Backoff starts once consecutive errors exceed this
    pub error_threshold: u32,
    pub error_backoff_cap_secs: u64,
    pub progress_log_interval: u64,
    pub category_failure_policy: CategoryFailurePolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            timeout_cooldown_secs: 30,
            fanout_timeout_cooldown_secs: 15,
            error_threshold: 2,
            error_backoff_cap_secs: 5,
            progress_log_interval: 500,
            category_failure_policy: CategoryFailurePolicy::Legacy,
        }
    }
}

impl WorkerConfig {
    pub fn timeout_cooldown(&self) -> Duration {
        Duration::from_secs(self.timeout_cooldown_secs)
    }

    pub fn fanout_timeout_cooldown(&self) -> Duration {
        Duration::from_secs(self.fanout_timeout_cooldown_secs)
    }

    /// Delay before the next dequeue after `error_count` consecutive failures
    pub fn error_backoff(&self, error_count: u32) -> Option<Duration> {
        if error_count > self.error_threshold {
            Some(Duration::from_secs(self.error_backoff_cap_secs.min(error_count as u64)))
        } else {
            None
        }
    }
}

// ============================================================================
// Stream Health
// ============================================================================

/// Base tolerances for one shard; `None` disables monitoring of that stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardTolerance {
    pub shard: ShardId,
    #[serde(default)]
    pub primary: Option<u64>,
    #[serde(default)]
    pub secondary: Option<u64>,
}

impl ShardTolerance {
    pub fn for_category(&self, category: StreamCategory) -> Option<u64> {
        match category {
            StreamCategory::Primary => self.primary,
            StreamCategory::Secondary => self.secondary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToleranceConfig {
    shards: Vec<ShardTolerance>,
}

impl ToleranceConfig {
    pub fn new(shards: Vec<ShardTolerance>) -> Self {
        Self { shards }
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn tolerance(&self, shard: ShardId, category: StreamCategory) -> Option<u64> {
        self.shards
            .iter()
            .find(|t| t.shard == shard)
            .and_then(|t| t.for_category(category))
    }

    /// Shards with monitoring enabled for `category`, paired with their base tolerance
    pub fn monitored(&self, category: StreamCategory) -> impl Iterator<Item = (ShardId, u64)> + '_ {
        self.shards
            .iter()
            .filter_map(move |t| t.for_category(category).map(|secs| (t.shard, secs)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub check_interval_secs: u64,
    /// Shards below this population get a widened threshold
    pub low_population_threshold: u32,
    pub low_population_multiplier: u32,
    /// Extra seconds added per failure, up to `failure_padding_cap` failures
    pub failure_padding_secs: u64,
    pub failure_padding_cap: u32,
    pub recovery_channel_capacity: usize,
    pub alert_retention: usize,
    pub tolerances: ToleranceConfig,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            low_population_threshold: 200,
            low_population_multiplier: 2,
            failure_padding_secs: 10,
            failure_padding_cap: 3,
            recovery_channel_capacity: 1024,
            alert_retention: 500,
            tolerances: ToleranceConfig::default(),
        }
    }
}

impl HealthConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

// ============================================================================
// Upstream Directory / Metrics
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
[worker]
timeout_cooldown_secs = 20
category_failure_policy = "isolated"

[health]
low_population_threshold = 150

[[health.tolerances]]
shard = 1
primary = 30
secondary = 60

[[health.tolerances]]
shard = 40
secondary = 120

[directory]
base_url = "http://directory.internal"
"#;

    #[test]
    fn test_defaults() {
        let config = PlanetWatchConfig::default();
        assert_eq!(config.worker.timeout_cooldown(), Duration::from_secs(30));
        assert_eq!(config.worker.fanout_timeout_cooldown(), Duration::from_secs(15));
        assert_eq!(config.worker.category_failure_policy, CategoryFailurePolicy::Legacy);
        assert_eq!(config.health.low_population_threshold, 200);
        assert!(config.health.tolerances.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let config = PlanetWatchConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.worker.timeout_cooldown_secs, 20);
        assert_eq!(config.worker.fanout_timeout_cooldown_secs, 15);
        assert_eq!(config.worker.category_failure_policy, CategoryFailurePolicy::Isolated);
        assert_eq!(config.health.low_population_threshold, 150);
        assert_eq!(config.health.failure_padding_secs, 10);
        assert_eq!(config.directory.base_url, "http://directory.internal");

        let tolerances = &config.health.tolerances;
        assert_eq!(tolerances.tolerance(1, StreamCategory::Primary), Some(30));
        assert_eq!(tolerances.tolerance(40, StreamCategory::Primary), None);
        assert_eq!(tolerances.tolerance(40, StreamCategory::Secondary), Some(120));
        assert_eq!(tolerances.tolerance(99, StreamCategory::Secondary), None);

        let primary: Vec<_> = tolerances.monitored(StreamCategory::Primary).collect();
        assert_eq!(primary, vec![(1, 30)]);
    }

    #[test]
    fn test_error_backoff() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.error_backoff(1), None);
        assert_eq!(worker.error_backoff(2), None);
        assert_eq!(worker.error_backoff(3), Some(Duration::from_secs(3)));
        assert_eq!(worker.error_backoff(40), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_load_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = PlanetWatchConfig::load(file.path()).unwrap();
        assert_eq!(config.health.tolerances.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        let config = PlanetWatchConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.directory.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("PW_DIRECTORY_URL", "http://other:9000"),
            ("PW_METRICS_ENABLED", "true"),
            ("PW_METRICS_PORT", "9100"),
        ]
        .into_iter()
        .collect();

        let mut config = PlanetWatchConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.directory.base_url, "http://other:9000");
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9100);

        let err = config
            .apply_overrides(|k| (k == "PW_METRICS_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
