//! Shared domain types cached by the engine.

pub mod organization;
pub mod query;

pub use organization::{LevelCount, Organization, OrganizationStats, StatusCount, TypeCount};
pub use query::QueryParams;
