//! Deadline-bounded access to the shared tier and two-tier writes.

use std::future::Future;

use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use orgcache_core::error::AppError;
use orgcache_core::result::AppResult;

use super::UnifiedCacheManager;
use crate::entry::{CacheEntry, CacheMetadata, CacheSource};
use crate::keys::EntityKind;

/// Outcome of an L2 read.
pub(super) enum L2Read {
    Hit(String),
    Miss,
    /// Failed or timed out; callers treat it as a miss.
    Unavailable,
}

/// What a cached payload describes.
pub(super) struct EntryDescriptor<'a> {
    pub tenant_id: Uuid,
    pub kind: EntityKind,
    pub entity_id: &'a str,
}

impl EntryDescriptor<'_> {
    pub fn metadata(&self, source: CacheSource) -> CacheMetadata {
        CacheMetadata::new(self.tenant_id, self.kind.as_str(), self.entity_id, source)
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags = vec![
            format!("tenant:{}", self.tenant_id),
            format!("type:{}", self.kind),
        ];
        if !self.entity_id.is_empty() {
            tags.push(format!("{}:{}", self.kind, self.entity_id));
        }
        tags
    }
}

impl UnifiedCacheManager {
    pub(super) async fn l2_read(&self, key: &str) -> L2Read {
        match timeout(self.inner.config.l2_timeout(), self.inner.l2.get(key)).await {
            Ok(Ok(Some(raw))) => L2Read::Hit(raw),
            Ok(Ok(None)) => L2Read::Miss,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "L2 read failed, treating as miss");
                L2Read::Unavailable
            }
            Err(_) => {
                warn!(key = %key, "L2 read timed out, treating as miss");
                L2Read::Unavailable
            }
        }
    }

    /// Read and parse an L2 entry; anything unusable is a miss.
    pub(super) async fn l2_entry(&self, key: &str) -> Option<CacheEntry> {
        let L2Read::Hit(raw) = self.l2_read(key).await else {
            return None;
        };
        match CacheEntry::from_json(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring malformed L2 entry");
                None
            }
        }
    }

    pub(super) async fn l2_write(&self, key: &str, value: &str) -> bool {
        let ttl = self.inner.config.l2_ttl();
        match timeout(self.inner.config.l2_timeout(), self.inner.l2.set(key, value, ttl)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "L2 write failed");
                false
            }
            Err(_) => {
                warn!(key = %key, "L2 write timed out");
                false
            }
        }
    }

    pub(super) async fn l2_remove(&self, key: &str) -> bool {
        match timeout(self.inner.config.l2_timeout(), self.inner.l2.delete(key)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "L2 delete failed");
                false
            }
            Err(_) => {
                warn!(key = %key, "L2 delete timed out");
                false
            }
        }
    }

    /// Copy an L2 entry into L1 for no longer than it has left in L2.
    ///
    /// An entry with no time left is not copied, so it can't displace a
    /// live one.
    pub(super) fn promote(&self, entry: CacheEntry) {
        let ttl = self.inner.l1.ttl().min(entry.remaining_ttl());
        if ttl.is_zero() {
            debug!(key = %entry.key, "Skipping promotion of expired L2 entry");
            return;
        }
        let key = entry.key.clone();
        self.inner.l1.set_with_ttl(&key, entry, ttl);
    }

    /// Write an entry to L2, then L1.
    ///
    /// A caller dropped between the two writes leaves L1 untouched, never
    /// holding data that L2 lacks.
    pub(super) async fn store_entry(&self, entry: CacheEntry) {
        match entry.to_json() {
            Ok(raw) => {
                self.l2_write(&entry.key, &raw).await;
            }
            Err(e) => warn!(key = %entry.key, error = %e, "Could not serialize cache entry"),
        }
        self.promote(entry);
    }

    /// Remove a key from both tiers. One failure doesn't stop the other.
    pub(super) async fn evict_key(&self, key: &str) -> bool {
        let in_l1 = self.inner.l1.delete(key);
        let removed = self.l2_remove(key).await;
        debug!(key = %key, in_l1, l2_removed = removed, "Evicted cache key");
        removed
    }

    /// Run an L3 call under the configured deadline.
    pub(super) async fn query_l3<T>(
        &self,
        query: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        let deadline = self.inner.config.l3_timeout();
        match timeout(deadline, query).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!(
                "authoritative query exceeded {}ms",
                deadline.as_millis()
            ))),
        }
    }
}
