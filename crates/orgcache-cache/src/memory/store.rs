//! In-memory distributed-tier implementation using the moka crate.
//!
//! Useful for single-process deployments and tests; nothing is shared
//! across processes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use orgcache_core::config::cache::MemoryCacheConfig;
use orgcache_core::result::AppResult;
use orgcache_core::traits::cache::DistributedCache;

#[derive(Debug, Clone)]
struct StoredValue {
    value: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache provider using moka.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    cache: Cache<String, StoredValue>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }

    /// Number of live entries (approximate until pending tasks run).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl DistributedCache for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|stored| stored.value.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.cache
            .insert(
                key.to_string(),
                StoredValue {
                    value: Arc::from(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        // Moka doesn't support pattern scanning, so we iterate.
        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.to_string())
            .collect();

        let count = keys_to_remove.len() as u64;
        for key in keys_to_remove {
            self.cache.invalidate(&key).await;
        }

        debug!(pattern, count, "Deleted keys matching pattern");
        Ok(count)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

/// Redis-style glob match supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider() -> MemoryCacheProvider {
        MemoryCacheProvider::new(&MemoryCacheConfig { max_capacity: 1000 })
    }

    #[tokio::test]
    async fn test_set_get() {
        let provider = make_provider();
        provider
            .set("key1", "value1", Duration::from_secs(60))
            .await
            .unwrap();
        let val = provider.get("key1").await.unwrap();
        assert_eq!(val, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_delete() {
        let provider = make_provider();
        provider
            .set("key2", "value2", Duration::from_secs(60))
            .await
            .unwrap();
        provider.delete("key2").await.unwrap();
        let val = provider.get("key2").await.unwrap();
        assert_eq!(val, None);
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        let provider = make_provider();
        provider
            .set("short", "v", Duration::from_millis(20))
            .await
            .unwrap();
        provider
            .set("long", "v", Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(provider.get("short").await.unwrap(), None);
        assert!(provider.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let provider = make_provider();
        for key in ["org_v1:stats:aa", "org_v1:organization:bb", "org_v2:stats:cc"] {
            provider
                .set(key, "v", Duration::from_secs(60))
                .await
                .unwrap();
        }

        let removed = provider.delete_pattern("org_v1:*stats:*").await.unwrap();
        assert_eq!(removed, 1);
        assert!(provider.get("org_v1:stats:aa").await.unwrap().is_none());
        assert!(provider.get("org_v2:stats:cc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_flush_all_and_health_check() {
        let provider = make_provider();
        provider.set("k", "v", Duration::from_secs(60)).await.unwrap();
        provider.flush_all().await.unwrap();
        assert!(provider.get("k").await.unwrap().is_none());
        assert!(provider.health_check().await.unwrap());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("ns:*", "ns:a:b"));
        assert!(glob_match("ns:*stats:*", "ns:stats:abc"));
        assert!(!glob_match("ns:*organization:*", "ns:organization_views:abc"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "abbc"));
        assert!(glob_match("*", ""));
    }
}
