//! Applying CDC events to the cache tiers.
//!
//! With write-through enabled, creates and updates carrying a complete
//! `after` image overwrite the entity's entry, deletes evict it, and every
//! tracked list view is patched or evicted. Otherwise everything the event
//! may affect is evicted. Stats are always evicted. Failures on one key are logged and
//! never stop work on the others.

use tracing::{debug, warn};
use uuid::Uuid;

use orgcache_core::config::ConsistencyMode;
use orgcache_core::events::{CdcEvent, CdcOperation, ORGANIZATION_ENTITY};
use orgcache_core::result::AppResult;
use orgcache_core::types::{Organization, QueryParams};

use super::UnifiedCacheManager;
use super::tiers::EntryDescriptor;
use crate::entry::{CacheEntry, CacheSource};
use crate::keys::EntityKind;

/// What happened to one cached list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewOutcome {
    Patched,
    Unchanged,
    Evicted,
}

impl UnifiedCacheManager {
    /// Apply one change event to both tiers.
    ///
    /// Events for other entity types are ignored. A malformed event is
    /// rejected before any cache entry is touched.
    pub async fn handle_cdc_event(&self, event: &CdcEvent) -> AppResult<()> {
        if event.entity_type != ORGANIZATION_ENTITY {
            debug!(
                event_id = %event.event_id,
                entity_type = %event.entity_type,
                "Ignoring CDC event for uncached entity type"
            );
            return Ok(());
        }

        let organization = event.to_organization()?;
        let tenant_id = event.tenant_id;
        let org_key = self
            .inner
            .keys
            .organization_key(tenant_id, &organization.code);

        // Creates and updates are written through only with a complete
        // post-change image; otherwise the event just evicts.
        let written = match event.operation {
            CdcOperation::Create | CdcOperation::Update if self.inner.config.write_through => {
                event.after_image()?
            }
            _ => None,
        };
        let evict_only = !self.inner.config.write_through
            || (event.operation != CdcOperation::Delete && written.is_none());

        if evict_only {
            let evicted = self.invalidate_affected(tenant_id, &org_key).await;
            debug!(
                event_id = %event.event_id,
                operation = %event.operation,
                tenant_id = %tenant_id,
                code = %organization.code,
                write_through = self.inner.config.write_through,
                evicted,
                "Invalidated cache entries for CDC event"
            );
            return Ok(());
        }

        let organization = match written {
            Some(current) => {
                self.write_entity(&org_key, &current, event).await;
                current
            }
            None => {
                self.evict_key(&org_key).await;
                organization
            }
        };

        let views = self.tracked_views(tenant_id).await;
        let (mut patched, mut evicted) = (0usize, 0usize);
        for params in &views {
            match self
                .apply_to_view(tenant_id, params, &organization, event.operation)
                .await
            {
                ViewOutcome::Patched => patched += 1,
                ViewOutcome::Evicted => evicted += 1,
                ViewOutcome::Unchanged => {}
            }
        }
        self.evict_key(&self.inner.keys.stats_key(tenant_id)).await;

        debug!(
            event_id = %event.event_id,
            operation = %event.operation,
            tenant_id = %tenant_id,
            code = %organization.code,
            views = views.len(),
            patched,
            evicted,
            "Applied CDC event"
        );
        Ok(())
    }

    /// Hand an event to the manager according to the consistency mode.
    ///
    /// STRONG applies it before returning; EVENTUAL queues it on the bus
    /// for the background listener.
    pub async fn ingest(&self, event: CdcEvent) -> AppResult<()> {
        match self.inner.config.consistency_mode {
            ConsistencyMode::Strong => self.handle_cdc_event(&event).await,
            ConsistencyMode::Eventual => {
                event.validate()?;
                let event_id = event.event_id.clone();
                if self.inner.bus.publish(event) == 0 {
                    warn!(event_id = %event_id, "No listener accepted CDC event");
                }
                Ok(())
            }
        }
    }

    async fn write_entity(&self, key: &str, organization: &Organization, event: &CdcEvent) {
        let descriptor = EntryDescriptor {
            tenant_id: event.tenant_id,
            kind: EntityKind::Organization,
            entity_id: &organization.code,
        };
        let mut metadata = descriptor.metadata(CacheSource::ChangeEvent);
        if event.timestamp > 0 {
            metadata.version = event.timestamp;
        }

        match CacheEntry::encode(
            key,
            organization,
            metadata,
            descriptor.tags(),
            self.inner.config.l2_ttl(),
        ) {
            Ok(entry) => self.store_entry(entry).await,
            Err(e) => {
                warn!(key = %key, error = %e, "Could not encode CDC snapshot, evicting instead");
                self.evict_key(key).await;
            }
        }
    }

    /// Patch one list view if it holds a complete result, evict it otherwise.
    ///
    /// L2 is the source for the patch; an L1 copy without a usable L2
    /// counterpart is dropped.
    async fn apply_to_view(
        &self,
        tenant_id: Uuid,
        params: &QueryParams,
        organization: &Organization,
        operation: CdcOperation,
    ) -> ViewOutcome {
        let key = self.inner.keys.list_key(tenant_id, params);
        let Some(entry) = self.l2_entry(&key).await else {
            self.inner.l1.delete(&key);
            return ViewOutcome::Unchanged;
        };

        let current: Vec<Organization> = match entry.decode() {
            Ok(list) => list,
            Err(e) => {
                warn!(key = %key, error = %e, "Evicting undecodable list view");
                self.evict_key(&key).await;
                return ViewOutcome::Evicted;
            }
        };

        if !params.holds_complete_result(current.len()) {
            self.evict_key(&key).await;
            return ViewOutcome::Evicted;
        }

        let (updated, changed) =
            self.inner
                .updater
                .update_list_cache(&current, organization, operation, params);
        if !changed {
            return ViewOutcome::Unchanged;
        }

        match entry.replace_data(&updated, CacheSource::ListPatch, self.inner.config.l2_ttl()) {
            Ok(patched) => {
                self.store_entry(patched).await;
                ViewOutcome::Patched
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Could not encode patched list view");
                self.evict_key(&key).await;
                ViewOutcome::Evicted
            }
        }
    }

    /// Evict the entity, its tenant's stats and every tracked list view.
    async fn invalidate_affected(&self, tenant_id: Uuid, org_key: &str) -> usize {
        let mut keys = vec![
            org_key.to_string(),
            self.inner.keys.stats_key(tenant_id),
        ];
        keys.extend(
            self.tracked_views(tenant_id)
                .await
                .iter()
                .map(|params| self.inner.keys.list_key(tenant_id, params)),
        );
        for key in &keys {
            self.evict_key(key).await;
        }
        keys.len()
    }
}
