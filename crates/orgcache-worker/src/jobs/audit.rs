//! Consistency audit: samples recently used L1 keys and compares them with L2.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use orgcache_cache::UnifiedCacheManager;

use crate::executor::{JobExecutionError, JobHandler};

#[derive(Debug)]
pub struct AuditJobHandler {
    manager: UnifiedCacheManager,
    interval: Option<Duration>,
    sample_size: usize,
}

impl AuditJobHandler {
    /// `interval_seconds == 0` disables the job.
    pub fn new(manager: UnifiedCacheManager, interval_seconds: u64, sample_size: usize) -> Self {
        Self {
            manager,
            interval: (interval_seconds > 0).then(|| Duration::from_secs(interval_seconds)),
            sample_size,
        }
    }
}

#[async_trait]
impl JobHandler for AuditJobHandler {
    fn name(&self) -> &str {
        "consistency_audit"
    }

    fn interval(&self) -> Option<Duration> {
        self.interval
    }

    async fn execute(&self) -> Result<Value, JobExecutionError> {
        let report = self.manager.sample_consistency(self.sample_size).await;

        if report.checked == 0 && report.unavailable > 0 {
            return Err(JobExecutionError::Transient(format!(
                "L2 unreadable for all {} sampled keys",
                report.unavailable
            )));
        }

        for issue in &report.inconsistencies {
            warn!(
                key = %issue.key,
                kind = %issue.kind,
                l1_exists = issue.l1_exists,
                l2_exists = issue.l2_exists,
                "Cache tiers diverge"
            );
        }
        info!(
            checked = report.checked,
            inconsistent = report.inconsistencies.len(),
            unavailable = report.unavailable,
            "Consistency audit finished"
        );

        Ok(json!({
            "checked": report.checked,
            "inconsistent": report.inconsistencies.len(),
            "unavailable": report.unavailable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use async_trait::async_trait;
    use orgcache_cache::memory::MemoryCacheProvider;
    use orgcache_core::config::cache::{CacheConfig, MemoryCacheConfig};
    use orgcache_core::result::AppResult;
    use orgcache_core::traits::OrganizationQuery;
    use orgcache_core::types::{Organization, OrganizationStats, QueryParams};
    use uuid::Uuid;

    #[derive(Debug)]
    struct OneUnit;

    #[async_trait]
    impl OrganizationQuery for OneUnit {
        async fn get_organizations(
            &self,
            _tenant_id: Uuid,
            _params: &QueryParams,
        ) -> AppResult<Vec<Organization>> {
            Ok(Vec::new())
        }

        async fn get_organization(
            &self,
            tenant_id: Uuid,
            code: &str,
        ) -> AppResult<Option<Organization>> {
            Ok(Some(Organization {
                code: code.to_string(),
                tenant_id,
                name: "Unit".to_string(),
                ..Organization::default()
            }))
        }

        async fn get_organization_stats(
            &self,
            _tenant_id: Uuid,
        ) -> AppResult<Option<OrganizationStats>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_audit_counts_sampled_keys() {
        let config = CacheConfig {
            sweep_interval_seconds: 0,
            ..CacheConfig::default()
        };
        let manager = UnifiedCacheManager::new(
            config,
            Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default())),
            Arc::new(OneUnit),
        )
        .unwrap();
        let tenant = Uuid::new_v4();
        manager.get_organization(tenant, "A").await.unwrap();
        manager.get_organization(tenant, "B").await.unwrap();

        let job = AuditJobHandler::new(manager.clone(), 60, 10);
        let summary = job.execute().await.unwrap();
        assert_eq!(summary["checked"], 2);
        assert_eq!(summary["inconsistent"], 0);

        manager.l2().flush_all().await.unwrap();
        let summary = job.execute().await.unwrap();
        assert_eq!(summary["inconsistent"], 2);
    }

    #[tokio::test]
    async fn test_zero_interval_disables_audit() {
        let manager = UnifiedCacheManager::new(
            CacheConfig {
                sweep_interval_seconds: 0,
                ..CacheConfig::default()
            },
            Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default())),
            Arc::new(OneUnit),
        )
        .unwrap();
        assert!(AuditJobHandler::new(manager, 0, 10).interval().is_none());
    }
}
