//! Built-in periodic jobs.

pub mod audit;
pub mod health;

pub use audit::AuditJobHandler;
pub use health::HealthJobHandler;
