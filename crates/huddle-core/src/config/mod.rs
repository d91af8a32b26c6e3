//! Session configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from an
//! optional TOML file merged with `HUDDLE_`-prefixed environment variables.
//! Each sub-module represents a logical configuration section.

pub mod logging;
pub mod realtime;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::realtime::{ReconnectConfig, RealtimeConfig};

use crate::error::AppError;

/// Root configuration.
///
/// This struct is the top-level deserialization target for the merged
/// configuration (default file + environment overlay + environment variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Realtime session settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default`, an environment-specific overlay
    /// (`config/{env}`), and environment variables prefixed with `HUDDLE_`
    /// (`HUDDLE_REALTIME__CONNECT_TIMEOUT_SECONDS=5`). Missing files are
    /// skipped so an empty environment yields the defaults.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("HUDDLE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.realtime.validate()?;
        Ok(loaded)
    }

    /// Parse configuration from an in-memory TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        let loaded: Self = config.try_deserialize()?;
        loaded.realtime.validate()?;
        Ok(loaded)
    }
}
