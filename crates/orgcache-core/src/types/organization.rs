//! Organization unit payloads served through the cache.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One organization unit, identified within its tenant by `code`.
///
/// Field aliases accept the camelCase spelling used by the command side,
/// so change snapshots from either write path decode into the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Organization {
    /// Tenant-scoped natural key.
    #[serde(default)]
    pub code: String,
    /// Owning tenant.
    #[serde(default, alias = "tenantId")]
    pub tenant_id: Uuid,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Unit type (`COMPANY`, `DEPARTMENT`, `TEAM`, ...).
    #[serde(default, alias = "unitType")]
    pub unit_type: String,
    /// Lifecycle status (`ACTIVE`, `INACTIVE`, ...).
    #[serde(default)]
    pub status: String,
    /// Depth in the hierarchy, root = 1.
    #[serde(default)]
    pub level: i32,
    /// Materialized path of ancestor codes.
    #[serde(default)]
    pub path: String,
    /// Ordering among siblings.
    #[serde(default, alias = "sortOrder")]
    pub sort_order: i32,
    #[serde(default)]
    pub description: String,
    /// Code of the parent unit; empty for roots.
    #[serde(default, alias = "parentCode")]
    pub parent_code: String,
    #[serde(default, alias = "createdAt", deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt", deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Aggregate counts for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrganizationStats {
    /// Number of units in the tenant.
    pub total_count: u64,
    #[serde(default)]
    pub by_type: Vec<TypeCount>,
    #[serde(default)]
    pub by_status: Vec<StatusCount>,
    #[serde(default)]
    pub by_level: Vec<LevelCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub unit_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCount {
    pub level: String,
    pub count: u64,
}

/// Accepts RFC 3339 strings, epoch milliseconds, or null.
///
/// Anything else decodes to `None` instead of failing the whole snapshot.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    })
}
