//! Distributed-tier provider selected from configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use orgcache_core::config::cache::L2Config;
use orgcache_core::error::AppError;
use orgcache_core::result::AppResult;
use orgcache_core::traits::cache::DistributedCache;

/// L2 provider that wraps the configured backend.
///
/// The backend is selected at construction time; an unreachable Redis is
/// a construction error.
#[derive(Debug, Clone)]
pub struct DistributedCacheProvider {
    inner: Arc<dyn DistributedCache>,
    backend: &'static str,
}

impl DistributedCacheProvider {
    /// Connect the backend named by `config.provider`.
    pub async fn new(config: &L2Config) -> AppResult<Self> {
        let (inner, backend): (Arc<dyn DistributedCache>, &'static str) =
            match config.provider.as_str() {
                #[cfg(feature = "redis-backend")]
                "redis" => {
                    info!("Initializing Redis L2 provider");
                    let client = crate::redis::RedisClient::connect(&config.redis).await?;
                    (
                        Arc::new(crate::redis::RedisCacheProvider::new(client)),
                        "redis",
                    )
                }
                #[cfg(feature = "memory")]
                "memory" => {
                    info!(
                        max_capacity = config.memory.max_capacity,
                        "Initializing in-memory L2 provider"
                    );
                    (
                        Arc::new(crate::memory::MemoryCacheProvider::new(&config.memory)),
                        "memory",
                    )
                }
                other => {
                    return Err(AppError::configuration(format!(
                        "Unknown L2 provider: '{other}'. Supported: memory, redis"
                    )));
                }
            };

        Ok(Self { inner, backend })
    }

    /// Wrap an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn DistributedCache>) -> Self {
        Self {
            inner: provider,
            backend: "custom",
        }
    }

    /// Name of the selected backend.
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

#[async_trait]
impl DistributedCache for DistributedCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        self.inner.delete_pattern(pattern).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.inner.flush_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgcache_core::error::ErrorKind;

    #[tokio::test]
    async fn test_unknown_provider_is_configuration_error() {
        let config = L2Config {
            provider: "memcached".to_string(),
            ..L2Config::default()
        };
        let err = DistributedCacheProvider::new(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[cfg(feature = "memory")]
    #[tokio::test]
    async fn test_memory_provider_delegates() {
        let config = L2Config {
            provider: "memory".to_string(),
            ..L2Config::default()
        };
        let provider = DistributedCacheProvider::new(&config).await.unwrap();
        assert_eq!(provider.backend(), "memory");
        provider.set("k", "v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(provider.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
