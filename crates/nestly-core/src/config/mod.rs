//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every field has a serde default so an empty file is valid.

pub mod client;
pub mod logging;
pub mod realtime;

use serde::{Deserialize, Serialize};

pub use self::client::{ClientConfig, SinkConfig};
pub use self::logging::LoggingConfig;
pub use self::realtime::{RealtimeConfig, ReconnectBackoffConfig};

use crate::error::AppError;

/// Prefix for environment variable overrides (`NESTLY__REALTIME__ENDPOINT`).
const ENV_PREFIX: &str = "NESTLY";

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default file + environment overlay + `NESTLY__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Realtime connection settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Event sink settings.
    #[serde(default)]
    pub sinks: SinkConfig,
    /// Client identity settings.
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config_path` with an environment-specific overlay
    /// (`config/{env}.toml`) and environment variables prefixed with
    /// `NESTLY__`. Missing files are skipped.
    pub fn load(config_path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(document: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?;
        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        self.realtime.validate()?;
        self.sinks.validate()?;
        Ok(())
    }
}
