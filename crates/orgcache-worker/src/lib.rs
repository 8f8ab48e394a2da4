//! Runtime glue around the OrgCache coherence engine.
//!
//! This crate provides:
//! - A CDC subscriber that feeds Redis pub/sub change events to the manager
//! - A worker runner that drives periodic jobs until shutdown
//! - Built-in jobs for health snapshots and consistency audits
//! - An HTTP adapter for the authoritative organization query service

pub mod cdc_source;
pub mod executor;
pub mod jobs;
pub mod runner;
pub mod upstream;

pub use cdc_source::CdcSubscriber;
pub use executor::{JobExecutor, JobHandler};
pub use runner::WorkerRunner;
pub use upstream::HttpOrganizationQuery;
