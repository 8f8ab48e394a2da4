//! List query parameters.

use serde::{Deserialize, Serialize};

/// Pagination plus free-text filter of one organization list view.
///
/// Together with the tenant, a `QueryParams` value identifies exactly one
/// cached list view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QueryParams {
    /// Page size; `0` means no limit.
    #[serde(default)]
    pub first: u32,
    /// Number of leading items skipped.
    #[serde(default)]
    pub offset: u32,
    /// Free-text filter on name or code; empty matches everything.
    #[serde(default)]
    pub search_text: String,
}

impl QueryParams {
    /// Create a page request without a filter.
    pub fn page(first: u32, offset: u32) -> Self {
        Self {
            first,
            offset,
            search_text: String::new(),
        }
    }

    /// Attach a free-text filter.
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    /// Whether a result of `len` items is the whole filtered set rather
    /// than one page of a larger one.
    pub fn holds_complete_result(&self, len: usize) -> bool {
        self.offset == 0 && (self.first == 0 || len < self.first as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_result_detection() {
        assert!(QueryParams::page(50, 0).holds_complete_result(3));
        assert!(!QueryParams::page(50, 0).holds_complete_result(50));
        assert!(!QueryParams::page(50, 50).holds_complete_result(3));
        assert!(QueryParams::page(0, 0).holds_complete_result(10_000));
    }
}
