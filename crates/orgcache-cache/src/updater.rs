//! In-place patching of cached organization lists after a single mutation.

use orgcache_core::events::CdcOperation;
use orgcache_core::types::{Organization, QueryParams};

/// Applies one change to a cached list view so it matches what a fresh
/// query with the same parameters would return.
///
/// Ordering must mirror the query service: ascending `sort_order`, then
/// `code`. Tenant scoping is left to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartCacheUpdater;

impl SmartCacheUpdater {
    pub fn new() -> Self {
        Self
    }

    /// Patch `existing` with `mutated`. Returns the new list and whether it
    /// differs from `existing`.
    pub fn update_list_cache(
        &self,
        existing: &[Organization],
        mutated: &Organization,
        operation: CdcOperation,
        params: &QueryParams,
    ) -> (Vec<Organization>, bool) {
        let position = existing.iter().position(|org| org.code == mutated.code);
        let matches = matches_query(mutated, params);
        let mut list = existing.to_vec();

        match (operation, position, matches) {
            (CdcOperation::Create | CdcOperation::Update, Some(idx), true) => {
                if list[idx] == *mutated {
                    return (list, false);
                }
                list[idx] = mutated.clone();
            }
            (CdcOperation::Create | CdcOperation::Update, None, true) => {
                list.push(mutated.clone());
            }
            (CdcOperation::Update, Some(idx), false) | (CdcOperation::Delete, Some(idx), _) => {
                list.remove(idx);
                return (list, true);
            }
            // Non-matching creates leave the view alone.
            (CdcOperation::Create, Some(_), false)
            | (CdcOperation::Create | CdcOperation::Update, None, false)
            | (CdcOperation::Delete, None, _) => return (list, false),
        }

        sort_organizations(&mut list);
        (list, true)
    }
}

/// Whether `org` belongs to the list view described by `params`.
///
/// An empty search text matches everything; otherwise the text must occur
/// in the name or code, ignoring case.
pub fn matches_query(org: &Organization, params: &QueryParams) -> bool {
    let needle = params.search_text.trim();
    if needle.is_empty() {
        return true;
    }
    let needle = needle.to_lowercase();
    org.name.to_lowercase().contains(&needle) || org.code.to_lowercase().contains(&needle)
}

/// Sort the way the query service orders list results.
pub fn sort_organizations(list: &mut [Organization]) {
    list.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.code.cmp(&b.code))
    });
}
