//! Registry of cached list views.
//!
//! List keys are digests, so they can't be found by pattern. Every filled
//! view is remembered per tenant, in process and in a shared index entry
//! in L2, so invalidation can enumerate the views a change may affect.

use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use orgcache_core::types::QueryParams;

use super::UnifiedCacheManager;
use super::tiers::L2Read;

#[derive(Debug)]
pub(super) struct ViewRegistry {
    local: DashMap<Uuid, Vec<QueryParams>>,
    max_views: usize,
}

impl ViewRegistry {
    pub fn new(max_views: usize) -> Self {
        Self {
            local: DashMap::new(),
            max_views: max_views.max(1),
        }
    }

    /// Remember a view. Returns views pushed out by the per-tenant cap,
    /// oldest first.
    pub fn remember(&self, tenant_id: Uuid, params: &QueryParams) -> Vec<QueryParams> {
        let mut views = self.local.entry(tenant_id).or_default();
        if views.contains(params) {
            return Vec::new();
        }
        views.push(params.clone());
        let overflow = views.len().saturating_sub(self.max_views);
        views.drain(..overflow).collect()
    }

    pub fn snapshot(&self, tenant_id: Uuid) -> Vec<QueryParams> {
        self.local
            .get(&tenant_id)
            .map(|views| views.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        self.local.clear();
    }
}

impl UnifiedCacheManager {
    /// Track a view served to a caller.
    ///
    /// With `share` set the L2 index is rewritten as well, refreshing its TTL.
    pub(super) async fn register_view(&self, tenant_id: Uuid, params: &QueryParams, share: bool) {
        let mut displaced = self.inner.views.remember(tenant_id, params);

        if share {
            let index_key = self.inner.keys.view_index_key(tenant_id);
            let mut index = match self.l2_read(&index_key).await {
                L2Read::Hit(raw) => decode_index(&index_key, &raw),
                L2Read::Miss => Vec::new(),
                // Rewriting from scratch would drop other processes' views.
                L2Read::Unavailable => {
                    return self.evict_displaced(tenant_id, params, displaced).await;
                }
            };
            if !index.contains(params) {
                index.push(params.clone());
            }
            let overflow = index.len().saturating_sub(self.inner.views.max_views);
            displaced.extend(index.drain(..overflow));

            match serde_json::to_string(&index) {
                Ok(raw) => {
                    self.l2_write(&index_key, &raw).await;
                }
                Err(e) => warn!(tenant_id = %tenant_id, error = %e, "Could not encode view index"),
            }
        }

        self.evict_displaced(tenant_id, params, displaced).await;
    }

    /// Every view known for a tenant, locally or through the shared index.
    pub(super) async fn tracked_views(&self, tenant_id: Uuid) -> Vec<QueryParams> {
        let mut views = self.inner.views.snapshot(tenant_id);
        let index_key = self.inner.keys.view_index_key(tenant_id);
        if let L2Read::Hit(raw) = self.l2_read(&index_key).await {
            for params in decode_index(&index_key, &raw) {
                if !views.contains(&params) {
                    views.push(params);
                }
            }
        }
        views
    }

    async fn evict_displaced(
        &self,
        tenant_id: Uuid,
        current: &QueryParams,
        displaced: Vec<QueryParams>,
    ) {
        for params in displaced.iter().filter(|p| *p != current) {
            let key = self.inner.keys.list_key(tenant_id, params);
            self.evict_key(&key).await;
            debug!(
                tenant_id = %tenant_id,
                first = params.first,
                offset = params.offset,
                "Evicted list view beyond tracking cap"
            );
        }
    }
}

fn decode_index(key: &str, raw: &str) -> Vec<QueryParams> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(key = %key, error = %e, "Ignoring malformed view index");
        Vec::new()
    })
}
