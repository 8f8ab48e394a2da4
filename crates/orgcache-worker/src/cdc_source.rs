//! Redis pub/sub consumer feeding change events into the cache manager.
//!
//! Messages are native [`CdcEvent`] JSON or Debezium envelopes. A message
//! that decodes to neither is logged and skipped. The subscription is
//! re-established after `reconnect_delay` whenever it drops.

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info, warn};

use orgcache_cache::UnifiedCacheManager;
use orgcache_cache::redis::mask_redis_url;
use orgcache_core::config::worker::CdcConfig;
use orgcache_core::error::{AppError, ErrorKind};
use orgcache_core::events::{CdcEvent, DebeziumEnvelope};
use orgcache_core::result::AppResult;

/// Decode one pub/sub payload into an event.
pub fn decode_event(payload: &str) -> AppResult<CdcEvent> {
    if let Ok(event) = serde_json::from_str::<CdcEvent>(payload) {
        return Ok(event);
    }
    DebeziumEnvelope::parse(payload)
        .and_then(DebeziumEnvelope::into_cdc_event)
        .map_err(|e| e.context("undecodable CDC message"))
}

#[derive(Debug)]
pub struct CdcSubscriber {
    config: CdcConfig,
    manager: UnifiedCacheManager,
}

impl CdcSubscriber {
    pub fn new(config: CdcConfig, manager: UnifiedCacheManager) -> Self {
        Self { config, manager }
    }

    /// Consume the channel until the cancel signal flips to `true`.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let delay = self.config.reconnect_delay();
        loop {
            if *cancel.borrow_and_update() {
                break;
            }

            tokio::select! {
                result = self.consume() => match result {
                    Ok(()) => warn!(channel = %self.config.channel, "CDC subscription closed"),
                    Err(e) => warn!(channel = %self.config.channel, error = %e, "CDC subscription failed"),
                },
                _ = cancel.changed() => break,
            }

            debug!(delay_secs = delay.as_secs(), "Reconnecting CDC subscription after delay");
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = cancel.changed() => break,
            }
        }
        info!(channel = %self.config.channel, "CDC subscriber stopped");
    }

    async fn consume(&self) -> AppResult<()> {
        let client = redis::Client::open(self.config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Invalid CDC Redis URL", e)
        })?;
        let mut pubsub = client.get_async_pubsub().await.map_err(|e| {
            AppError::with_source(ErrorKind::ServiceUnavailable, "CDC pub/sub connect failed", e)
        })?;
        pubsub.subscribe(&self.config.channel).await.map_err(|e| {
            AppError::with_source(ErrorKind::ServiceUnavailable, "CDC subscribe failed", e)
        })?;
        info!(
            url = %mask_redis_url(&self.config.url),
            channel = %self.config.channel,
            "Subscribed to CDC channel"
        );

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            match msg.get_payload::<String>() {
                Ok(payload) => {
                    self.process(&payload).await;
                }
                Err(e) => warn!(error = %e, "Skipping CDC message with non-text payload"),
            }
        }
        Ok(())
    }

    /// Decode and ingest one message. Returns whether it was applied or queued.
    pub async fn process(&self, payload: &str) -> bool {
        let event = match decode_event(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "Skipping CDC message");
                return false;
            }
        };

        let (event_id, tenant_id) = (event.event_id.clone(), event.tenant_id);
        match self.manager.ingest(event).await {
            Ok(()) => {
                debug!(event_id = %event_id, tenant_id = %tenant_id, "CDC event ingested");
                true
            }
            Err(e) => {
                warn!(event_id = %event_id, tenant_id = %tenant_id, error = %e, "CDC event rejected");
                false
            }
        }
    }
}
