//! Health monitor: logs the cache stats snapshot.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use orgcache_cache::UnifiedCacheManager;

use crate::executor::{JobExecutionError, JobHandler};

#[derive(Debug)]
pub struct HealthJobHandler {
    manager: UnifiedCacheManager,
    interval: Option<Duration>,
}

impl HealthJobHandler {
    /// `interval_seconds == 0` disables the job.
    pub fn new(manager: UnifiedCacheManager, interval_seconds: u64) -> Self {
        Self {
            manager,
            interval: (interval_seconds > 0).then(|| Duration::from_secs(interval_seconds)),
        }
    }
}

#[async_trait]
impl JobHandler for HealthJobHandler {
    fn name(&self) -> &str {
        "cache_health"
    }

    fn interval(&self) -> Option<Duration> {
        self.interval
    }

    async fn execute(&self) -> Result<Value, JobExecutionError> {
        let stats = self.manager.get_cache_stats().await;

        if stats.l2_connected {
            info!(
                l1_size = stats.l1.size,
                l1_hits = stats.l1.hits,
                l1_misses = stats.l1.misses,
                l1_hit_rate = stats.l1.hit_rate,
                l1_evictions = stats.l1.evictions,
                events_published = stats.events.published,
                events_dropped = stats.events.dropped,
                "Cache health"
            );
        } else {
            warn!(
                l1_size = stats.l1.size,
                l1_hit_rate = stats.l1.hit_rate,
                "Cache health: L2 unreachable, reads fall through to the query service"
            );
        }

        serde_json::to_value(&stats)
            .map_err(|e| JobExecutionError::Permanent(format!("Stats are not serializable: {e}")))
    }
}
