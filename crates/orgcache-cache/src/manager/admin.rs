//! Administrative operations: refresh, purge, stats, audits and shutdown.

use std::sync::atomic::Ordering;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use orgcache_core::config::ConsistencyMode;
use orgcache_core::error::AppError;
use orgcache_core::result::AppResult;

use super::UnifiedCacheManager;
use crate::bus::BusStats;
use crate::consistency::ConsistencyReport;
use crate::keys::EntityKind;
use crate::l1::L1Stats;

/// Snapshot for health and metrics endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub namespace: String,
    pub l1: L1Stats,
    pub l2_connected: bool,
    pub write_through: bool,
    pub consistency_mode: ConsistencyMode,
    pub events: BusStats,
}

impl UnifiedCacheManager {
    /// Force-evict cached data of one kind for a tenant from both tiers.
    ///
    /// `Organization` needs the unit code; `OrganizationList` evicts every
    /// tracked list view of the tenant. Returns the number of keys evicted.
    pub async fn refresh_cache(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        entity_id: Option<&str>,
    ) -> AppResult<usize> {
        let keys = match kind {
            EntityKind::Organization => {
                let code = entity_id.filter(|code| !code.is_empty()).ok_or_else(|| {
                    AppError::validation("refreshing a single organization requires its code")
                })?;
                vec![self.inner.keys.organization_key(tenant_id, code)]
            }
            EntityKind::OrganizationList => self
                .tracked_views(tenant_id)
                .await
                .iter()
                .map(|params| self.inner.keys.list_key(tenant_id, params))
                .collect(),
            EntityKind::OrganizationStats => vec![self.inner.keys.stats_key(tenant_id)],
        };

        for key in &keys {
            self.evict_key(key).await;
        }
        info!(
            tenant_id = %tenant_id,
            kind = %kind,
            entity_id = entity_id.unwrap_or_default(),
            evicted = keys.len(),
            "Cache refreshed"
        );
        Ok(keys.len())
    }

    /// Drop everything this manager's namespace holds in both tiers.
    ///
    /// Returns the number of L2 keys removed.
    pub async fn purge_namespace(&self) -> u64 {
        self.inner.l1.clear();
        self.inner.views.clear();

        let mut removed = 0;
        for pattern in self.inner.keys.namespace_patterns() {
            match timeout(
                self.inner.config.l2_timeout(),
                self.inner.l2.delete_pattern(&pattern),
            )
            .await
            {
                Ok(Ok(count)) => removed += count,
                Ok(Err(e)) => warn!(pattern = %pattern, error = %e, "L2 pattern delete failed"),
                Err(_) => warn!(pattern = %pattern, "L2 pattern delete timed out"),
            }
        }

        info!(namespace = %self.inner.config.namespace, removed, "Cache namespace purged");
        removed
    }

    pub async fn get_cache_stats(&self) -> CacheStats {
        let l2_connected = matches!(
            timeout(self.inner.config.l2_timeout(), self.inner.l2.health_check()).await,
            Ok(Ok(true))
        );

        CacheStats {
            namespace: self.inner.config.namespace.clone(),
            l1: self.inner.l1.get_stats(),
            l2_connected,
            write_through: self.inner.config.write_through,
            consistency_mode: self.inner.config.consistency_mode,
            events: self.inner.bus.stats(),
        }
    }

    /// Compare the given keys across L1 and L2.
    pub async fn check_consistency(&self, keys: &[String]) -> ConsistencyReport {
        self.inner.checker.check_consistency(keys).await
    }

    /// Compare up to `sample_size` of the most recently used L1 keys.
    pub async fn sample_consistency(&self, sample_size: usize) -> ConsistencyReport {
        let keys = self.inner.l1.keys(sample_size);
        self.check_consistency(&keys).await
    }

    /// Close the event bus and stop background tasks. Idempotent.
    ///
    /// Events already queued are applied before the listener exits. Reads
    /// keep working afterwards.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.bus.close();
        self.inner.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Cache background task ended abnormally");
            }
        }
        info!("Unified cache manager closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}
