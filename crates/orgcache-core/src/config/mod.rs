//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every field has a default so a missing file is valid.

pub mod cache;
pub mod logging;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::cache::{CacheConfig, L2Config};
use self::logging::LoggingConfig;
use self::worker::{CdcConfig, UpstreamConfig, WorkerConfig};

use crate::error::AppError;

pub use self::cache::ConsistencyMode;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache engine settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Distributed cache backend settings.
    #[serde(default)]
    pub l2: L2Config,
    /// Change-event source settings.
    #[serde(default)]
    pub cdc: CdcConfig,
    /// Authoritative query service settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Periodic job settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `ORGCACHE__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ORGCACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
