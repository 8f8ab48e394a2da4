//! Background worker, CDC source, and upstream configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Periodic maintenance job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Interval in seconds between stats snapshots in the log (0 disables it).
    #[serde(default = "default_health_interval")]
    pub health_interval_seconds: u64,
    /// Interval in seconds between consistency audits (0 disables it).
    #[serde(default = "default_audit_interval")]
    pub audit_interval_seconds: u64,
    /// Number of L1 keys sampled per audit.
    #[serde(default = "default_audit_sample")]
    pub audit_sample_size: usize,
    /// Grace period in seconds for background tasks during shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            health_interval_seconds: default_health_interval(),
            audit_interval_seconds: default_audit_interval(),
            audit_sample_size: default_audit_sample(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

/// Change-data-capture source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdcConfig {
    /// Whether the pub/sub consumer is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Redis URL of the pub/sub server carrying change events.
    #[serde(default = "default_cdc_url")]
    pub url: String,
    /// Channel the write path publishes organization changes on.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Delay in seconds before reconnecting after the subscription drops.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_seconds: u64,
}

impl CdcConfig {
    /// Reconnect back-off.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }
}

impl Default for CdcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_cdc_url(),
            channel: default_channel(),
            reconnect_delay_seconds: default_reconnect_delay(),
        }
    }
}

/// Authoritative organization query service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the query service.
    #[serde(default = "default_upstream_url")]
    pub base_url: String,
    /// Header carrying the tenant id.
    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            tenant_header: default_tenant_header(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_health_interval() -> u64 {
    30
}

fn default_audit_interval() -> u64 {
    300
}

fn default_audit_sample() -> usize {
    50
}

fn default_shutdown_grace() -> u64 {
    15
}

fn default_cdc_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_channel() -> String {
    "organization_db.public.organization_units".to_string()
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_upstream_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_tenant_header() -> String {
    "X-Tenant-ID".to_string()
}
