//! Cache engine and distributed-tier configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How invalidation timing relates to event arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsistencyMode {
    /// Events are applied inline by the caller that ingests them.
    #[default]
    Strong,
    /// Events are queued on the event bus and applied by a background listener.
    Eventual,
}

impl fmt::Display for ConsistencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong => write!(f, "STRONG"),
            Self::Eventual => write!(f, "EVENTUAL"),
        }
    }
}

/// Configuration of the unified cache manager.
///
/// The manager copies this struct at construction; it is never mutated
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Namespace prefixed to every cache key.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// TTL of in-process (L1) entries in seconds.
    #[serde(default = "default_l1_ttl")]
    pub l1_ttl_seconds: u64,
    /// TTL of distributed (L2) entries in seconds.
    #[serde(default = "default_l2_ttl")]
    pub l2_ttl_seconds: u64,
    /// Maximum number of L1 entries.
    #[serde(default = "default_l1_max_size")]
    pub l1_max_size: usize,
    /// Patch cached data on mutation instead of only evicting it.
    #[serde(default = "default_true")]
    pub write_through: bool,
    /// Invalidation timing.
    #[serde(default)]
    pub consistency_mode: ConsistencyMode,
    /// Interval of the background L1 expiry sweep in seconds (0 disables it).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Deadline applied to every L2 call in milliseconds.
    #[serde(default = "default_l2_timeout")]
    pub l2_timeout_ms: u64,
    /// Deadline applied to every L3 call in milliseconds.
    #[serde(default = "default_l3_timeout")]
    pub l3_timeout_ms: u64,
    /// Per-subscriber buffer of the CDC event bus.
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
    /// Maximum list views remembered per tenant for invalidation.
    #[serde(default = "default_max_tracked_views")]
    pub max_tracked_views: usize,
}

impl CacheConfig {
    /// L1 entry lifetime.
    pub fn l1_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_ttl_seconds)
    }

    /// L2 entry lifetime.
    pub fn l2_ttl(&self) -> Duration {
        Duration::from_secs(self.l2_ttl_seconds)
    }

    /// Interval of the background sweep, `None` when disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_seconds > 0).then(|| Duration::from_secs(self.sweep_interval_seconds))
    }

    /// Deadline for a single L2 call.
    pub fn l2_timeout(&self) -> Duration {
        Duration::from_millis(self.l2_timeout_ms)
    }

    /// Deadline for a single L3 call.
    pub fn l3_timeout(&self) -> Duration {
        Duration::from_millis(self.l3_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            l1_ttl_seconds: default_l1_ttl(),
            l2_ttl_seconds: default_l2_ttl(),
            l1_max_size: default_l1_max_size(),
            write_through: true,
            consistency_mode: ConsistencyMode::default(),
            sweep_interval_seconds: default_sweep_interval(),
            l2_timeout_ms: default_l2_timeout(),
            l3_timeout_ms: default_l3_timeout(),
            event_buffer_size: default_event_buffer(),
            max_tracked_views: default_max_tracked_views(),
        }
    }
}

/// Distributed (L2) cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2Config {
    /// Backend type: `"redis"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis-specific settings.
    #[serde(default)]
    pub redis: RedisCacheConfig,
    /// In-memory backend settings.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl Default for L2Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis: RedisCacheConfig::default(),
            memory: MemoryCacheConfig::default(),
        }
    }
}

/// Redis cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Prefix applied in front of every key before it reaches Redis.
    #[serde(default)]
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: String::new(),
        }
    }
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the cache.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_namespace() -> String {
    "org_v1".to_string()
}

fn default_l1_ttl() -> u64 {
    300
}

fn default_l2_ttl() -> u64 {
    1800
}

fn default_l1_max_size() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_l2_timeout() -> u64 {
    500
}

fn default_l3_timeout() -> u64 {
    5000
}

fn default_event_buffer() -> usize {
    100
}

fn default_max_tracked_views() -> usize {
    256
}

fn default_provider() -> String {
    "redis".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_max_capacity() -> u64 {
    10000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_mode_serde() {
        let mode: ConsistencyMode = serde_json::from_str("\"EVENTUAL\"").unwrap();
        assert_eq!(mode, ConsistencyMode::Eventual);
        assert_eq!(serde_json::to_string(&ConsistencyMode::Strong).unwrap(), "\"STRONG\"");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.namespace, "org_v1");
        assert_eq!(config.l1_ttl(), Duration::from_secs(300));
        assert_eq!(config.l2_ttl(), Duration::from_secs(1800));
        assert!(config.write_through);
        assert_eq!(config.consistency_mode, ConsistencyMode::Strong);
    }

    #[test]
    fn test_zero_sweep_interval_disables_sweeper() {
        let config = CacheConfig {
            sweep_interval_seconds: 0,
            ..CacheConfig::default()
        };
        assert!(config.sweep_interval().is_none());
    }
}
