//! Cache key derivation for every entry the engine stores.
//!
//! Keys are `"{namespace}:{entity_type}:{digest}"`, where the digest is a
//! SHA-256 over a length-prefixed encoding of namespace, entity type and
//! identifiers. Key length therefore doesn't grow with the number of
//! identifiers, and `("ab", "c")` never collides with `("a", "bc")`.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use orgcache_core::error::AppError;
use orgcache_core::types::QueryParams;

/// Entity type of the per-tenant list-view index.
const VIEW_INDEX_ENTITY: &str = "organization_views";

/// The kinds of cached payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A single organization unit.
    Organization,
    /// One list view of a tenant's units.
    OrganizationList,
    /// A tenant's aggregate counts.
    OrganizationStats,
}

impl EntityKind {
    /// Every kind stored under a namespace.
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Organization,
        EntityKind::OrganizationList,
        EntityKind::OrganizationStats,
    ];

    /// Entity-type segment used in keys and metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::OrganizationList => "organizations",
            Self::OrganizationStats => "stats",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" => Ok(Self::Organization),
            "organizations" => Ok(Self::OrganizationList),
            "stats" => Ok(Self::OrganizationStats),
            other => Err(AppError::validation(format!(
                "Unknown cache entity type: '{other}'. Supported: organization, organizations, stats"
            ))),
        }
    }
}

/// Namespaced key builder.
#[derive(Debug, Clone)]
pub struct CacheKeyManager {
    namespace: String,
}

impl CacheKeyManager {
    /// Create a key manager for a namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace every key starts with.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Derive the key for an entity type and an ordered identifier tuple.
    pub fn generate_key(&self, entity_type: &str, identifiers: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in [self.namespace.as_str(), entity_type]
            .into_iter()
            .chain(identifiers.iter().copied())
        {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        format!("{}:{entity_type}:{:x}", self.namespace, hasher.finalize())
    }

    /// Glob patterns that match every key of the namespace containing a tag.
    pub fn get_pattern_for_tags(&self, tags: &[&str]) -> Vec<String> {
        tags.iter()
            .map(|tag| format!("{}:*{tag}*", self.namespace))
            .collect()
    }

    /// Patterns covering every entry kind of the namespace.
    pub fn namespace_patterns(&self) -> Vec<String> {
        let tags: Vec<String> = EntityKind::ALL
            .iter()
            .map(EntityKind::as_str)
            .chain([VIEW_INDEX_ENTITY])
            .map(|kind| format!("{kind}:"))
            .collect();
        let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
        self.get_pattern_for_tags(&tags)
    }

    /// Key of a single organization.
    pub fn organization_key(&self, tenant_id: Uuid, code: &str) -> String {
        let tenant = tenant_id.to_string();
        self.generate_key(EntityKind::Organization.as_str(), &[&tenant, code])
    }

    /// Key of one list view.
    pub fn list_key(&self, tenant_id: Uuid, params: &QueryParams) -> String {
        let tenant = tenant_id.to_string();
        let first = params.first.to_string();
        let offset = params.offset.to_string();
        self.generate_key(
            EntityKind::OrganizationList.as_str(),
            &[&tenant, &first, &offset, &params.search_text],
        )
    }

    /// Key of a tenant's stats.
    pub fn stats_key(&self, tenant_id: Uuid) -> String {
        let tenant = tenant_id.to_string();
        self.generate_key(EntityKind::OrganizationStats.as_str(), &[&tenant])
    }

    /// Key of the index of list views cached for a tenant.
    pub fn view_index_key(&self, tenant_id: Uuid) -> String {
        let tenant = tenant_id.to_string();
        self.generate_key(VIEW_INDEX_ENTITY, &[&tenant])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identical_arguments_yield_identical_keys() {
        let km = CacheKeyManager::new("org_v1");
        let tenant = Uuid::new_v4().to_string();
        let a = km.generate_key("organizations", &[&tenant, "50", "0", ""]);
        let b = km.generate_key("organizations", &[&tenant, "50", "0", ""]);
        assert_eq!(a, b);
        assert!(a.starts_with("org_v1:organizations:"));
    }

    #[test]
    fn test_any_argument_change_changes_key() {
        let km = CacheKeyManager::new("org_v1");
        let tenant = Uuid::new_v4().to_string();
        let base = km.generate_key("organizations", &[&tenant, "50", "0", ""]);
        let variants = [
            km.generate_key("organizations", &[&tenant, "100", "0", ""]),
            km.generate_key("organizations", &[&tenant, "50", "50", ""]),
            km.generate_key("organizations", &[&tenant, "50", "0", "sales"]),
            km.generate_key("organization", &[&tenant, "50", "0", ""]),
            CacheKeyManager::new("org_v2").generate_key("organizations", &[&tenant, "50", "0", ""]),
        ];
        for variant in variants {
            assert_ne!(base, variant);
        }
    }

    #[test]
    fn test_identifier_boundaries_are_significant() {
        let km = CacheKeyManager::new("ns");
        assert_ne!(
            km.generate_key("organization", &["ab", "c"]),
            km.generate_key("organization", &["a", "bc"])
        );
        assert_ne!(
            km.generate_key("organization", &["a", "b"]),
            km.generate_key("organization", &["b", "a"])
        );
    }

    #[test]
    fn test_key_length_is_independent_of_identifier_count() {
        let km = CacheKeyManager::new("ns");
        let short = km.generate_key("organizations", &["t"]);
        let long = km.generate_key("organizations", &["t", "50", "0", "a long search text"]);
        assert_eq!(short.len(), long.len());
    }

    #[test]
    fn test_patterns_for_tags() {
        let km = CacheKeyManager::new("org_v1");
        let patterns = km.get_pattern_for_tags(&["tenant:one", "type:list"]);
        assert_eq!(patterns, vec!["org_v1:*tenant:one*", "org_v1:*type:list*"]);
    }

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("stats".parse::<EntityKind>().unwrap(), EntityKind::OrganizationStats);
        assert!("positions".parse::<EntityKind>().is_err());
    }

    proptest! {
        #[test]
        fn prop_key_is_a_function_of_its_inputs(
            entity in "[a-z]{1,12}",
            ids in proptest::collection::vec(".{0,16}", 0..5),
        ) {
            let km = CacheKeyManager::new("prop");
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            prop_assert_eq!(km.generate_key(&entity, &refs), km.generate_key(&entity, &refs));
        }

        #[test]
        fn prop_distinct_tuples_yield_distinct_keys(
            a in proptest::collection::vec("[a-z0-9]{0,8}", 1..4),
            b in proptest::collection::vec("[a-z0-9]{0,8}", 1..4),
        ) {
            prop_assume!(a != b);
            let km = CacheKeyManager::new("prop");
            let ra: Vec<&str> = a.iter().map(String::as_str).collect();
            let rb: Vec<&str> = b.iter().map(String::as_str).collect();
            prop_assert_ne!(km.generate_key("organizations", &ra), km.generate_key("organizations", &rb));
        }
    }
}
