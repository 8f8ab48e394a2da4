//! Core traits defined in `orgcache-core` and implemented by other crates.

pub mod cache;
pub mod query;

pub use cache::DistributedCache;
pub use query::OrganizationQuery;
