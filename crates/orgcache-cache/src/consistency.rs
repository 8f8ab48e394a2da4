//! Read-only comparison of the L1 and L2 tiers.
//!
//! The checker reports divergence; it never repairs it. L1 is read with
//! [`L1Cache::peek`] so a check leaves recency and hit counters untouched.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use orgcache_core::traits::DistributedCache;

use crate::entry::CacheEntry;
use crate::l1::L1Cache;

/// How a key diverges between tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InconsistencyKind {
    /// Present in one tier only.
    ExistenceMismatch,
    /// Present in both with different payloads.
    ContentMismatch,
}

impl fmt::Display for InconsistencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExistenceMismatch => write!(f, "existence mismatch"),
            Self::ContentMismatch => write!(f, "content mismatch"),
        }
    }
}

/// One divergent key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inconsistency {
    pub key: String,
    pub kind: InconsistencyKind,
    pub l1_exists: bool,
    pub l2_exists: bool,
    pub l1_hash: Option<String>,
    pub l2_hash: Option<String>,
}

/// Result of one consistency check.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    /// Keys compared in both tiers.
    pub checked: usize,
    pub inconsistencies: Vec<Inconsistency>,
    /// Keys skipped because L2 could not be read.
    pub unavailable: usize,
    pub checked_at: DateTime<Utc>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.inconsistencies.is_empty()
    }
}

/// Compares sampled keys across L1 and L2.
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    l1: Arc<L1Cache>,
    l2: Arc<dyn DistributedCache>,
    l2_timeout: Duration,
}

impl ConsistencyChecker {
    pub fn new(l1: Arc<L1Cache>, l2: Arc<dyn DistributedCache>) -> Self {
        Self {
            l1,
            l2,
            l2_timeout: Duration::from_millis(500),
        }
    }

    /// Bound every L2 read by `timeout`.
    pub fn with_l2_timeout(mut self, timeout: Duration) -> Self {
        self.l2_timeout = timeout;
        self
    }

    pub async fn check_consistency(&self, keys: &[String]) -> ConsistencyReport {
        let mut report = ConsistencyReport {
            checked: 0,
            inconsistencies: Vec::new(),
            unavailable: 0,
            checked_at: Utc::now(),
        };

        for key in keys {
            let l1_hash = self.l1.peek(key).map(|entry| content_hash(&entry.data));
            let l2_hash = match self.read_l2(key).await {
                Some(value) => value,
                None => {
                    report.unavailable += 1;
                    continue;
                }
            };
            report.checked += 1;

            let kind = match (&l1_hash, &l2_hash) {
                (Some(a), Some(b)) if a != b => InconsistencyKind::ContentMismatch,
                (Some(_), None) | (None, Some(_)) => InconsistencyKind::ExistenceMismatch,
                _ => continue,
            };
            debug!(key = %key, kind = %kind, "Cache tiers diverge");
            report.inconsistencies.push(Inconsistency {
                key: key.clone(),
                kind,
                l1_exists: l1_hash.is_some(),
                l2_exists: l2_hash.is_some(),
                l1_hash,
                l2_hash,
            });
        }

        report
    }

    /// Payload hash of the L2 entry: `Some(None)` when absent, `None` when
    /// L2 could not be read.
    async fn read_l2(&self, key: &str) -> Option<Option<String>> {
        match tokio::time::timeout(self.l2_timeout, self.l2.get(key)).await {
            Ok(Ok(Some(raw))) => Some(Some(match CacheEntry::from_json(&raw) {
                Ok(entry) => content_hash(&entry.data),
                Err(_) => content_hash(&raw),
            })),
            Ok(Ok(None)) => Some(None),
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Consistency check could not read L2");
                None
            }
            Err(_) => {
                warn!(key = %key, "Consistency check timed out reading L2");
                None
            }
        }
    }
}

/// Hex SHA-256 of a serialized payload.
pub fn content_hash(data: &str) -> String {
    format!("{:x}", Sha256::digest(data.as_bytes()))
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::entry::{CacheMetadata, CacheSource};
    use crate::memory::MemoryCacheProvider;
    use orgcache_core::config::cache::MemoryCacheConfig;
    use uuid::Uuid;

    fn entry(key: &str, value: &str) -> CacheEntry {
        CacheEntry::encode(
            key,
            value,
            CacheMetadata::new(Uuid::nil(), "organization", key, CacheSource::Query),
            Vec::new(),
            Duration::from_secs(60),
        )
        .unwrap()
    }

    fn tiers() -> (Arc<L1Cache>, Arc<MemoryCacheProvider>) {
        (
            Arc::new(L1Cache::new(10, Duration::from_secs(60))),
            Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default())),
        )
    }

    #[tokio::test]
    async fn test_l1_only_key_is_existence_mismatch() {
        let (l1, l2) = tiers();
        l1.set("only-l1", entry("only-l1", "v"));
        let checker = ConsistencyChecker::new(l1.clone(), l2);

        let report = checker.check_consistency(&["only-l1".to_string()]).await;
        assert_eq!(report.checked, 1);
        assert_eq!(report.inconsistencies.len(), 1);
        assert_eq!(
            report.inconsistencies[0].kind,
            InconsistencyKind::ExistenceMismatch
        );
        assert!(report.inconsistencies[0].l1_exists);
        assert_eq!(l1.get_stats().hits + l1.get_stats().misses, 0);
    }

    #[tokio::test]
    async fn test_matching_and_diverging_content() {
        let (l1, l2) = tiers();
        let same = entry("same", "v1");
        l1.set("same", same.clone());
        l2.set("same", &same.to_json().unwrap(), Duration::from_secs(60))
            .await
            .unwrap();

        l1.set("drift", entry("drift", "new"));
        l2.set(
            "drift",
            &entry("drift", "old").to_json().unwrap(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let checker = ConsistencyChecker::new(l1, l2);
        let report = checker
            .check_consistency(&["same".to_string(), "drift".to_string(), "none".to_string()])
            .await;
        assert_eq!(report.checked, 3);
        assert_eq!(report.inconsistencies.len(), 1);
        assert_eq!(report.inconsistencies[0].key, "drift");
        assert_eq!(
            report.inconsistencies[0].kind,
            InconsistencyKind::ContentMismatch
        );
    }

    #[test]
    fn test_content_hash_is_stable_hex() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_eq!(content_hash("abc").len(), 64);
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
