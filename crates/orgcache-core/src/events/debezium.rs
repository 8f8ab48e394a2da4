//! Decoding of Debezium change envelopes into [`CdcEvent`]s.

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{CdcEvent, CdcOperation, ORGANIZATION_ENTITY};
use crate::error::AppError;
use crate::result::AppResult;

/// A Debezium message with the schema envelope enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct DebeziumEnvelope {
    pub payload: DebeziumPayload,
}

/// The change itself.
#[derive(Debug, Clone, Deserialize)]
pub struct DebeziumPayload {
    #[serde(default)]
    pub before: Option<Map<String, Value>>,
    #[serde(default)]
    pub after: Option<Map<String, Value>>,
    /// `c` create, `r` snapshot read, `u` update, `d` delete.
    pub op: String,
    /// Commit time in epoch milliseconds.
    #[serde(default)]
    pub ts_ms: i64,
}

impl DebeziumEnvelope {
    /// Parse either an enveloped message or a bare payload.
    pub fn parse(raw: &str) -> AppResult<Self> {
        if let Ok(envelope) = serde_json::from_str::<Self>(raw) {
            return Ok(envelope);
        }
        let payload: DebeziumPayload = serde_json::from_str(raw)?;
        Ok(Self { payload })
    }

    /// Convert into an organization change event.
    pub fn into_cdc_event(self) -> AppResult<CdcEvent> {
        let DebeziumPayload {
            before,
            after,
            op,
            ts_ms,
        } = self.payload;

        let operation = match op.as_str() {
            "c" | "r" => CdcOperation::Create,
            "u" => CdcOperation::Update,
            "d" => CdcOperation::Delete,
            other => {
                return Err(AppError::validation(format!(
                    "unsupported Debezium operation '{other}'"
                )));
            }
        };

        // Deletes keep only the before image, creates only the after image.
        let (before, after) = match operation {
            CdcOperation::Create => (None, after),
            CdcOperation::Update => (before, after),
            CdcOperation::Delete => (before, None),
        };

        let data = after
            .as_ref()
            .or(before.as_ref())
            .ok_or_else(|| AppError::validation("Debezium payload has no row image"))?;

        let tenant_id = data
            .get("tenant_id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| AppError::validation("Debezium row image has no valid tenant_id"))?;
        let entity_id = data
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let event = CdcEvent {
            event_id: Uuid::new_v4().to_string(),
            operation,
            entity_type: ORGANIZATION_ENTITY.to_string(),
            entity_id,
            tenant_id,
            before,
            after,
            timestamp: ts_ms,
            source: "debezium".to_string(),
        };
        event.validate()?;
        Ok(event)
    }
}
