//! Shared test helpers for cache manager integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use orgcache_cache::entry::CacheEntry;
use orgcache_cache::memory::MemoryCacheProvider;
use orgcache_cache::updater::{matches_query, sort_organizations};
use orgcache_cache::UnifiedCacheManager;
use orgcache_core::config::cache::{CacheConfig, MemoryCacheConfig};
use orgcache_core::error::AppError;
use orgcache_core::result::AppResult;
use orgcache_core::traits::{DistributedCache, OrganizationQuery};
use orgcache_core::types::{Organization, OrganizationStats, QueryParams, TypeCount};

/// In-memory stand-in for the authoritative query service.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    orgs: Mutex<Vec<Organization>>,
    list_calls: AtomicUsize,
    single_calls: AtomicUsize,
    stats_calls: AtomicUsize,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeDirectory {
    pub fn with(orgs: Vec<Organization>) -> Arc<Self> {
        let directory = Self::default();
        *directory.orgs.lock() = orgs;
        Arc::new(directory)
    }

    pub fn upsert(&self, org: Organization) {
        let mut orgs = self.orgs.lock();
        orgs.retain(|o| !(o.tenant_id == org.tenant_id && o.code == org.code));
        orgs.push(org);
    }

    pub fn remove(&self, tenant_id: Uuid, code: &str) {
        self.orgs
            .lock()
            .retain(|o| !(o.tenant_id == tenant_id && o.code == code));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> AppResult<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::external_service("query service returned 503"));
        }
        Ok(())
    }

    fn tenant_orgs(&self, tenant_id: Uuid) -> Vec<Organization> {
        self.orgs
            .lock()
            .iter()
            .filter(|o| o.tenant_id == tenant_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OrganizationQuery for FakeDirectory {
    async fn get_organizations(
        &self,
        tenant_id: Uuid,
        params: &QueryParams,
    ) -> AppResult<Vec<Organization>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        let mut list: Vec<Organization> = self
            .tenant_orgs(tenant_id)
            .into_iter()
            .filter(|o| matches_query(o, params))
            .collect();
        sort_organizations(&mut list);

        let page = list.into_iter().skip(params.offset as usize);
        Ok(if params.first == 0 {
            page.collect()
        } else {
            page.take(params.first as usize).collect()
        })
    }

    async fn get_organization(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> AppResult<Option<Organization>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        Ok(self
            .tenant_orgs(tenant_id)
            .into_iter()
            .find(|o| o.code == code))
    }

    async fn get_organization_stats(&self, tenant_id: Uuid) -> AppResult<Option<OrganizationStats>> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        let orgs = self.tenant_orgs(tenant_id);
        if orgs.is_empty() {
            return Ok(None);
        }
        let mut by_type: Vec<TypeCount> = Vec::new();
        for org in &orgs {
            match by_type.iter_mut().find(|t| t.unit_type == org.unit_type) {
                Some(entry) => entry.count += 1,
                None => by_type.push(TypeCount {
                    unit_type: org.unit_type.clone(),
                    count: 1,
                }),
            }
        }
        Ok(Some(OrganizationStats {
            total_count: orgs.len() as u64,
            by_type,
            ..OrganizationStats::default()
        }))
    }
}

/// L2 whose every call fails, as if Redis were down.
#[derive(Debug, Default)]
pub struct UnreachableCache;

#[async_trait]
impl DistributedCache for UnreachableCache {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::cache("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
        Err(AppError::cache("connection refused"))
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Err(AppError::cache("connection refused"))
    }

    async fn delete_pattern(&self, _pattern: &str) -> AppResult<u64> {
        Err(AppError::cache("connection refused"))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Err(AppError::cache("connection refused"))
    }

    async fn flush_all(&self) -> AppResult<()> {
        Err(AppError::cache("connection refused"))
    }
}

/// L2 whose calls never complete.
#[derive(Debug, Default)]
pub struct StalledCache;

#[async_trait]
impl DistributedCache for StalledCache {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        std::future::pending().await
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
        std::future::pending().await
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        std::future::pending().await
    }

    async fn delete_pattern(&self, _pattern: &str) -> AppResult<u64> {
        std::future::pending().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        std::future::pending().await
    }

    async fn flush_all(&self) -> AppResult<()> {
        std::future::pending().await
    }
}

/// A manager wired to an in-memory L2 and a [`FakeDirectory`].
pub struct TestCache {
    pub manager: UnifiedCacheManager,
    pub l2: Arc<MemoryCacheProvider>,
    pub directory: Arc<FakeDirectory>,
    pub tenant: Uuid,
}

impl TestCache {
    pub fn new(orgs: Vec<Organization>, tenant: Uuid) -> Self {
        Self::with_config(test_config(), orgs, tenant)
    }

    pub fn with_config(config: CacheConfig, orgs: Vec<Organization>, tenant: Uuid) -> Self {
        let l2 = Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default()));
        Self::sharing(config, Arc::clone(&l2), FakeDirectory::with(orgs), tenant)
    }

    /// A second manager over an existing L2 and directory, like another process.
    pub fn sharing(
        config: CacheConfig,
        l2: Arc<MemoryCacheProvider>,
        directory: Arc<FakeDirectory>,
        tenant: Uuid,
    ) -> Self {
        let manager = UnifiedCacheManager::new(
            config,
            Arc::clone(&l2) as Arc<dyn DistributedCache>,
            Arc::clone(&directory) as Arc<dyn OrganizationQuery>,
        )
        .expect("Failed to build cache manager");
        Self {
            manager,
            l2,
            directory,
            tenant,
        }
    }

    /// Decode whatever L2 holds under `key`.
    pub async fn l2_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.l2.get(key).await.expect("memory L2 never fails")?;
        let entry = CacheEntry::from_json(&raw).expect("L2 holds a cache entry");
        Some(entry.decode().expect("payload decodes"))
    }

    /// Decode whatever L1 holds under `key`, without touching recency.
    pub fn l1_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.manager
            .l1()
            .peek(key)
            .map(|entry| entry.decode().expect("payload decodes"))
    }
}

/// Manager settings for tests: no background sweep.
pub fn test_config() -> CacheConfig {
    CacheConfig {
        namespace: "org_test".to_string(),
        sweep_interval_seconds: 0,
        ..CacheConfig::default()
    }
}

pub fn org(tenant_id: Uuid, code: &str, name: &str, sort_order: i32) -> Organization {
    Organization {
        code: code.to_string(),
        tenant_id,
        name: name.to_string(),
        unit_type: "DEPARTMENT".to_string(),
        status: "ACTIVE".to_string(),
        level: 2,
        path: format!("/ROOT/{code}"),
        sort_order,
        parent_code: "ROOT".to_string(),
        ..Organization::default()
    }
}

/// Three units of one tenant: Sales East (1), Finance (2), Sales West (3).
pub fn seed(tenant_id: Uuid) -> Vec<Organization> {
    vec![
        org(tenant_id, "1000001", "Sales East", 1),
        org(tenant_id, "1000002", "Finance", 2),
        org(tenant_id, "1000003", "Sales West", 3),
    ]
}

pub fn codes(list: &[Organization]) -> Vec<&str> {
    list.iter().map(|o| o.code.as_str()).collect()
}

/// Poll `check` until it holds or one second passes.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
