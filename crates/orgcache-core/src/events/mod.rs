//! Change-data-capture events emitted by the write path.
//!
//! Events are ingested by the cache manager, which evicts or patches the
//! cached data they affect. They arrive either in the native [`CdcEvent`]
//! shape or as Debezium envelopes (see [`debezium`]).

pub mod debezium;

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::Organization;

pub use debezium::DebeziumEnvelope;

/// Entity type carried by organization change events.
pub const ORGANIZATION_ENTITY: &str = "organization";

/// Columns a cached unit must carry, with their accepted spellings.
const LISTED_FIELDS: &[&[&str]] = &[
    &["name"],
    &["unit_type", "unitType"],
    &["status"],
    &["level"],
    &["sort_order", "sortOrder"],
];

/// Kind of mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CdcOperation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for CdcOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// One entity-level change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdcEvent {
    /// Unique event ID.
    pub event_id: String,
    /// The mutation.
    pub operation: CdcOperation,
    /// Entity type, e.g. `"organization"`.
    pub entity_type: String,
    /// Natural key of the entity.
    pub entity_id: String,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Row state before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Map<String, Value>>,
    /// Row state after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Map<String, Value>>,
    /// When the change was committed, epoch milliseconds.
    pub timestamp: i64,
    /// Producer of the event (`debezium`, `domain_event`, ...).
    #[serde(default)]
    pub source: String,
}

impl CdcEvent {
    /// Build an organization event from a typed snapshot.
    ///
    /// Deletes carry the snapshot as `before`, everything else as `after`.
    pub fn organization(
        operation: CdcOperation,
        tenant_id: Uuid,
        snapshot: &Organization,
        source: impl Into<String>,
    ) -> AppResult<Self> {
        let Value::Object(map) = serde_json::to_value(snapshot)? else {
            return Err(AppError::internal("organization did not serialize to an object"));
        };
        let (before, after) = match operation {
            CdcOperation::Delete => (Some(map), None),
            CdcOperation::Create | CdcOperation::Update => (None, Some(map)),
        };
        Ok(Self {
            event_id: Uuid::new_v4().to_string(),
            operation,
            entity_type: ORGANIZATION_ENTITY.to_string(),
            entity_id: snapshot.code.clone(),
            tenant_id,
            before,
            after,
            timestamp: Utc::now().timestamp_millis(),
            source: source.into(),
        })
    }

    /// Reject events that can't be applied.
    pub fn validate(&self) -> AppResult<()> {
        if self.before.is_none() && self.after.is_none() {
            return Err(AppError::validation(format!(
                "CDC event {} carries neither a before nor an after snapshot",
                self.event_id
            )));
        }
        if self.entity_id.is_empty() && self.snapshot_code().is_none() {
            return Err(AppError::validation(format!(
                "CDC event {} has no entity id",
                self.event_id
            )));
        }
        Ok(())
    }

    /// The most recent snapshot: `after` if present, otherwise `before`.
    pub fn snapshot(&self) -> Option<&Map<String, Value>> {
        self.after.as_ref().or(self.before.as_ref())
    }

    fn snapshot_code(&self) -> Option<&str> {
        self.snapshot()
            .and_then(|data| data.get("code"))
            .and_then(Value::as_str)
            .filter(|code| !code.is_empty())
    }

    /// The row image: `after` laid over `before`, so columns an update
    /// left out keep their previous values.
    fn merged_image(&self) -> Option<Map<String, Value>> {
        match (&self.before, &self.after) {
            (Some(before), Some(after)) => {
                let mut merged = before.clone();
                merged.extend(after.iter().map(|(k, v)| (k.clone(), v.clone())));
                Some(merged)
            }
            (before, after) => after.as_ref().or(before.as_ref()).cloned(),
        }
    }

    /// Decode the row image as an [`Organization`] scoped to the event's tenant.
    ///
    /// Identifies the affected unit. Use [`CdcEvent::after_image`] for the
    /// state to cache.
    pub fn to_organization(&self) -> AppResult<Organization> {
        self.validate()?;
        let data = self
            .merged_image()
            .ok_or_else(|| AppError::validation("CDC event has no snapshot"))?;
        self.decode(data)
    }

    /// The post-change state of a create or update, when the event carries
    /// one that is complete.
    ///
    /// `None` for deletes, for events without an `after` image, and for
    /// images missing a field that cached lists filter or sort on.
    pub fn after_image(&self) -> AppResult<Option<Organization>> {
        self.validate()?;
        if self.operation == CdcOperation::Delete || self.after.is_none() {
            return Ok(None);
        }
        let Some(data) = self.merged_image() else {
            return Ok(None);
        };
        let complete = LISTED_FIELDS.iter().all(|names| {
            names
                .iter()
                .any(|name| data.get(*name).is_some_and(|v| !v.is_null()))
        });
        if !complete {
            return Ok(None);
        }
        self.decode(data).map(Some)
    }

    fn decode(&self, data: Map<String, Value>) -> AppResult<Organization> {
        let mut org: Organization = serde_json::from_value(Value::Object(data)).map_err(|e| {
            AppError::with_source(
                crate::error::ErrorKind::Validation,
                format!("CDC event {} snapshot is not an organization", self.event_id),
                e,
            )
        })?;
        org.tenant_id = self.tenant_id;
        if org.code.is_empty() {
            org.code = self.entity_id.clone();
        }
        Ok(org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn org(code: &str) -> Organization {
        Organization {
            code: code.to_string(),
            name: format!("Org {code}"),
            ..Organization::default()
        }
    }

    #[test]
    fn test_delete_event_carries_before_snapshot() {
        let event =
            CdcEvent::organization(CdcOperation::Delete, Uuid::nil(), &org("A"), "test").unwrap();
        assert!(event.before.is_some());
        assert!(event.after.is_none());
        assert_eq!(event.entity_id, "A");
    }

    #[test]
    fn test_event_without_snapshots_is_rejected() {
        let mut event =
            CdcEvent::organization(CdcOperation::Update, Uuid::nil(), &org("A"), "test").unwrap();
        event.after = None;
        assert!(event.validate().is_err());
        assert!(event.to_organization().is_err());
    }

    #[test]
    fn test_to_organization_prefers_after_and_scopes_tenant() {
        let tenant = Uuid::new_v4();
        let event = CdcEvent {
            event_id: "evt-1".to_string(),
            operation: CdcOperation::Update,
            entity_type: ORGANIZATION_ENTITY.to_string(),
            entity_id: "ORG-1".to_string(),
            tenant_id: tenant,
            before: Some(json!({"code": "ORG-1", "name": "Old"}).as_object().unwrap().clone()),
            after: Some(json!({"name": "New", "sortOrder": 3}).as_object().unwrap().clone()),
            timestamp: 0,
            source: "domain_event".to_string(),
        };
        let org = event.to_organization().unwrap();
        assert_eq!(org.name, "New");
        assert_eq!(org.code, "ORG-1");
        assert_eq!(org.sort_order, 3);
        assert_eq!(org.tenant_id, tenant);
        // Neither image names the type, status or level
        assert_eq!(event.after_image().unwrap(), None);
    }

    #[test]
    fn test_after_image_merges_partial_update_over_before() {
        let tenant = Uuid::new_v4();
        let full = Organization {
            code: "ORG-1".to_string(),
            name: "Old".to_string(),
            unit_type: "TEAM".to_string(),
            status: "ACTIVE".to_string(),
            level: 3,
            sort_order: 7,
            ..Organization::default()
        };
        let Value::Object(before) = serde_json::to_value(&full).unwrap() else {
            panic!("organization serializes to an object");
        };
        let mut event = CdcEvent::organization(CdcOperation::Update, tenant, &full, "test").unwrap();
        event.before = Some(before);
        event.after = Some(json!({"name": "New"}).as_object().unwrap().clone());

        let org = event.after_image().unwrap().unwrap();
        assert_eq!(org.name, "New");
        assert_eq!(org.unit_type, "TEAM");
        assert_eq!(org.level, 3);
        assert_eq!(org.sort_order, 7);
        assert_eq!(org.tenant_id, tenant);
    }

    #[test]
    fn test_after_image_needs_an_after_snapshot() {
        let mut event =
            CdcEvent::organization(CdcOperation::Update, Uuid::nil(), &org("A"), "test").unwrap();
        event.before = event.after.take();
        assert!(event.to_organization().is_ok());
        assert_eq!(event.after_image().unwrap(), None);

        let delete =
            CdcEvent::organization(CdcOperation::Delete, Uuid::nil(), &org("A"), "test").unwrap();
        assert_eq!(delete.after_image().unwrap(), None);
    }

    #[test]
    fn test_operation_wire_format() {
        let event =
            CdcEvent::organization(CdcOperation::Create, Uuid::nil(), &org("A"), "test").unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["operation"], "CREATE");
        assert!(json.get("before").is_none());
    }
}
