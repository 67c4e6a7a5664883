//! Bootstrap-validated configuration.
//!
//! The core never reads environment variables itself; it receives an
//! already-validated `EntryPointConfig`. This module exists for the
//! bootstrap collaborator to build that value consistently: layered
//! YAML overlaid with env vars.

use std::time::Duration;

use serde::Deserialize;

pub const ENTRY_POINT_NAME_ENV_VAR: &str = "APP_ENTRY_POINT_NAME";
pub const ENVIRONMENT_ENV_VAR: &str = "APP_ENVIRONMENT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Prod,
    Dev,
    Test,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationCheckFailed {
    #[error("missing required config: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("failed to load configuration: {0}")]
    LoadFailed(#[from] config::ConfigError),
}

/// The already-validated `{entryPointName, environment}` pair.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryPointConfig {
    pub entry_point_name: String,
    pub environment: Environment,
}

/// Tunables for `SagaProvider`'s retry-on-transient-failure loop.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SagaRetryConfig {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for SagaRetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2000,
            max_attempts: 5,
        }
    }
}

impl SagaRetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    pub entry_point: EntryPointConfig,
    #[serde(default)]
    pub saga_retry: SagaRetryConfig,
}

impl CoreConfig {
    /// Load from `config.yaml` (if present) overlaid with `APP_*` / `CORE_*`
    /// environment variables.
    pub fn load() -> Result<Self, ConfigurationCheckFailed> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("CORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .add_source(
                config::Environment::default()
                    .prefix_separator("_")
                    .with_list_parse_key("entry_point")
                    .try_parsing(true),
            );

        let settings = builder.build()?;
        settings.try_deserialize().map_err(Into::into)
    }
}
