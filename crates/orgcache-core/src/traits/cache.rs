//! Distributed (L2) cache trait for pluggable backends.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Trait for the shared cache tier (Redis or in-memory).
///
/// All values are serialized as strings (JSON). The provider is
/// responsible for any backend-level key prefixing and TTL enforcement.
#[async_trait]
pub trait DistributedCache: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a value with a TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Delete a key from the cache.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Delete all keys matching a glob pattern (e.g., `"org_v1:*tenant*"`).
    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64>;

    /// Check that the cache backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Flush all entries owned by this provider.
    async fn flush_all(&self) -> AppResult<()>;
}
