//! Authoritative (L3) organization query interface.

use async_trait::async_trait;
use uuid::Uuid;

use crate::result::AppResult;
use crate::types::{Organization, OrganizationStats, QueryParams};

/// Read-only access to the source of truth behind the cache.
///
/// "Not found" is `Ok(None)`, never an error. The list ordering must be
/// ascending `sort_order` with `code` as tie-break, the same order the
/// cache uses when it patches lists.
#[async_trait]
pub trait OrganizationQuery: Send + Sync + std::fmt::Debug + 'static {
    /// One page of a tenant's organization units.
    async fn get_organizations(
        &self,
        tenant_id: Uuid,
        params: &QueryParams,
    ) -> AppResult<Vec<Organization>>;

    /// A single unit by natural key.
    async fn get_organization(&self, tenant_id: Uuid, code: &str)
    -> AppResult<Option<Organization>>;

    /// Aggregate counts for a tenant.
    async fn get_organization_stats(&self, tenant_id: Uuid) -> AppResult<Option<OrganizationStats>>;
}
