//! # orgcache-core
//!
//! Core crate for OrgCache. Contains the unified error system,
//! configuration schemas, organization domain types, the change-data-capture
//! event model, and the traits implemented by the cache tiers and the
//! authoritative query service.
//!
//! This crate has **no** internal dependencies on other OrgCache crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
