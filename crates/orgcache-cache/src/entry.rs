//! The envelope stored in both cache tiers.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orgcache_core::error::{AppError, ErrorKind};
use orgcache_core::result::AppResult;

/// Which path produced an entry's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheSource {
    /// Loaded from the authoritative query service.
    #[serde(rename = "L3")]
    Query,
    /// Written from a change event snapshot.
    #[serde(rename = "CDC")]
    ChangeEvent,
    /// A cached list patched in place after a change event.
    #[serde(rename = "CDC_SMART_UPDATE")]
    ListPatch,
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "L3"),
            Self::ChangeEvent => write!(f, "CDC"),
            Self::ListPatch => write!(f, "CDC_SMART_UPDATE"),
        }
    }
}

/// Descriptive metadata of a cached payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub tenant_id: Uuid,
    pub entity_type: String,
    /// Entity code for single entities, empty for lists and stats.
    #[serde(default)]
    pub entity_id: String,
    /// Monotonic version, epoch milliseconds of the last write.
    pub version: i64,
    pub last_modified: DateTime<Utc>,
    pub source: CacheSource,
}

impl CacheMetadata {
    pub fn new(
        tenant_id: Uuid,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        source: CacheSource,
    ) -> Self {
        let now = Utc::now();
        Self {
            tenant_id,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            version: now.timestamp_millis(),
            last_modified: now,
            source,
        }
    }
}

/// A serialized payload plus its metadata.
///
/// `data` holds the payload as JSON text so both tiers compare and
/// transport the exact same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: String,
    pub metadata: CacheMetadata,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Serialize `value` into a new entry that expires after `ttl`.
    pub fn encode<T: Serialize + ?Sized>(
        key: impl Into<String>,
        value: &T,
        metadata: CacheMetadata,
        tags: Vec<String>,
        ttl: Duration,
    ) -> AppResult<Self> {
        let data = serde_json::to_string(value)?;
        let created_at = Utc::now();
        Ok(Self {
            key: key.into(),
            data,
            metadata,
            tags,
            created_at,
            expires_at: expiry_after(created_at, ttl),
        })
    }

    /// Decode the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_str(&self.data).map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                format!("Cached payload under '{}' is undecodable", self.key),
                e,
            )
        })
    }

    /// Replace the payload, bumping version and source.
    pub fn replace_data<T: Serialize + ?Sized>(
        &self,
        value: &T,
        source: CacheSource,
        ttl: Duration,
    ) -> AppResult<Self> {
        let now = Utc::now();
        let mut metadata = self.metadata.clone();
        metadata.version = now.timestamp_millis().max(metadata.version + 1);
        metadata.last_modified = now;
        metadata.source = source;
        Ok(Self {
            key: self.key.clone(),
            data: serde_json::to_string(value)?,
            metadata,
            tags: self.tags.clone(),
            created_at: self.created_at,
            expires_at: expiry_after(now, ttl),
        })
    }

    /// Time left before `expires_at`, zero once passed.
    pub fn remaining_ttl(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Wire form stored in L2.
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the wire form stored in L2.
    pub fn from_json(raw: &str) -> AppResult<Self> {
        serde_json::from_str(raw).map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Malformed cache entry", e)
        })
    }
}

fn expiry_after(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_roundtrip_keeps_payload_bytes() {
        let meta = CacheMetadata::new(Uuid::new_v4(), "stats", "", CacheSource::Query);
        let entry = CacheEntry::encode(
            "ns:stats:abc",
            &serde_json::json!({"total_count": 3}),
            meta,
            vec!["type:stats".to_string()],
            Duration::from_secs(60),
        )
        .unwrap();
        let back = CacheEntry::from_json(&entry.to_json().unwrap()).unwrap();
        assert_eq!(back.data, entry.data);
        assert_eq!(back.metadata.source, CacheSource::Query);
        assert!(back.remaining_ttl() > Duration::from_secs(50));
    }

    #[test]
    fn test_replace_data_bumps_version() {
        let meta = CacheMetadata::new(Uuid::nil(), "organizations", "", CacheSource::Query);
        let entry =
            CacheEntry::encode("k", &vec![1, 2], meta, Vec::new(), Duration::from_secs(60)).unwrap();
        let patched = entry
            .replace_data(&vec![1, 2, 3], CacheSource::ListPatch, Duration::from_secs(60))
            .unwrap();
        assert!(patched.metadata.version > entry.metadata.version);
        assert_eq!(patched.metadata.source, CacheSource::ListPatch);
        assert_eq!(patched.decode::<Vec<i32>>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_undecodable_payload_is_serialization_error() {
        let meta = CacheMetadata::new(Uuid::nil(), "organization", "A", CacheSource::Query);
        let mut entry =
            CacheEntry::encode("k", "text", meta, Vec::new(), Duration::from_secs(1)).unwrap();
        entry.data = "{not json".to_string();
        let err = entry.decode::<serde_json::Value>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }
}
