//! Read-through path: L1, then L2, then the authoritative query.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use orgcache_core::error::AppError;
use orgcache_core::result::AppResult;
use orgcache_core::types::{Organization, OrganizationStats, QueryParams};

use super::UnifiedCacheManager;
use super::tiers::EntryDescriptor;
use crate::entry::{CacheEntry, CacheSource};
use crate::keys::EntityKind;

/// Tier that answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    L1,
    L2,
    L3,
}

impl UnifiedCacheManager {
    /// One list view of a tenant's organization units.
    pub async fn get_organizations(
        &self,
        tenant_id: Uuid,
        params: &QueryParams,
    ) -> AppResult<Vec<Organization>> {
        let key = self.inner.keys.list_key(tenant_id, params);
        let descriptor = EntryDescriptor {
            tenant_id,
            kind: EntityKind::OrganizationList,
            entity_id: "",
        };

        let read = self
            .read_through(&key, &descriptor, async {
                self.inner.l3.get_organizations(tenant_id, params).await.map(Some)
            })
            .await
            .map_err(|e| {
                e.context(format_args!(
                    "get_organizations tenant={tenant_id} first={} offset={} search='{}'",
                    params.first, params.offset, params.search_text
                ))
            })?;

        let Some((organizations, tier)) = read else {
            return Ok(Vec::new());
        };
        match tier {
            Tier::L1 => {}
            Tier::L2 => self.register_view(tenant_id, params, false).await,
            Tier::L3 => self.register_view(tenant_id, params, true).await,
        }
        Ok(organizations)
    }

    /// A single unit, `None` when the query service doesn't know it.
    pub async fn get_organization(
        &self,
        tenant_id: Uuid,
        code: &str,
    ) -> AppResult<Option<Organization>> {
        if code.is_empty() {
            return Err(AppError::validation("organization code must not be empty"));
        }
        let key = self.inner.keys.organization_key(tenant_id, code);
        let descriptor = EntryDescriptor {
            tenant_id,
            kind: EntityKind::Organization,
            entity_id: code,
        };

        let read = self
            .read_through(&key, &descriptor, async {
                self.inner.l3.get_organization(tenant_id, code).await
            })
            .await
            .map_err(|e| {
                e.context(format_args!("get_organization tenant={tenant_id} code={code}"))
            })?;
        Ok(read.map(|(organization, _)| organization))
    }

    /// A tenant's aggregate counts.
    pub async fn get_organization_stats(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Option<OrganizationStats>> {
        let key = self.inner.keys.stats_key(tenant_id);
        let descriptor = EntryDescriptor {
            tenant_id,
            kind: EntityKind::OrganizationStats,
            entity_id: "",
        };

        let read = self
            .read_through(&key, &descriptor, async {
                self.inner.l3.get_organization_stats(tenant_id).await
            })
            .await
            .map_err(|e| e.context(format_args!("get_organization_stats tenant={tenant_id}")))?;
        Ok(read.map(|(stats, _)| stats))
    }

    /// Shared lookup for every read.
    ///
    /// Undecodable cached payloads count as misses. Only the L3 call can
    /// fail the read; its result fills L2 then L1, and a `None` result is
    /// not cached.
    async fn read_through<T>(
        &self,
        key: &str,
        descriptor: &EntryDescriptor<'_>,
        load: impl Future<Output = AppResult<Option<T>>>,
    ) -> AppResult<Option<(T, Tier)>>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(entry) = self.inner.l1.get(key) {
            match entry.decode::<T>() {
                Ok(value) => {
                    debug!(key = %key, "L1 cache hit");
                    return Ok(Some((value, Tier::L1)));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Evicting undecodable L1 entry");
                    self.inner.l1.delete(key);
                }
            }
        }

        if let Some(entry) = self.l2_entry(key).await {
            match entry.decode::<T>() {
                Ok(value) => {
                    debug!(key = %key, "L2 cache hit, promoting to L1");
                    self.promote(entry);
                    return Ok(Some((value, Tier::L2)));
                }
                Err(e) => warn!(key = %key, error = %e, "Ignoring undecodable L2 entry"),
            }
        }

        debug!(key = %key, entity_type = %descriptor.kind, "Cache miss, querying L3");
        let Some(value) = self.query_l3(load).await? else {
            return Ok(None);
        };

        match CacheEntry::encode(
            key,
            &value,
            descriptor.metadata(CacheSource::Query),
            descriptor.tags(),
            self.inner.config.l2_ttl(),
        ) {
            Ok(entry) => self.store_entry(entry).await,
            Err(e) => warn!(key = %key, error = %e, "Could not encode L3 result for caching"),
        }
        Ok(Some((value, Tier::L3)))
    }
}
