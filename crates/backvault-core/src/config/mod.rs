//! Application configuration schemas.
//!
//! All configuration structs are deserialized from a TOML file via the
//! `config` crate, overlaid by `BACKVAULT__*` environment variables. Each
//! sub-module represents a logical configuration section.

pub mod coordination;
pub mod job;
pub mod logging;
pub mod object_store;
pub mod placeholders;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::coordination::CoordinationConfig;
pub use self::job::{DefaultsConfig, JobConfig, RetentionPolicy, SourceSpec};
pub use self::logging::LoggingConfig;
pub use self::object_store::ObjectStoreConfig;

use crate::error::AppError;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BACKVAULT";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote object store connection.
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    /// Values applied to jobs that do not set their own.
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Lock, registry and scheduler settings.
    #[serde(default)]
    pub coordination: CoordinationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Configured backup jobs, in declaration order.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables prefixed with `BACKVAULT__` override file
    /// values, then `ENV_<NAME>` placeholders are resolved.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::configuration(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = config::Config::builder().add_source(config::File::from(path).required(true));
        Self::build(builder)
    }

    /// Load configuration from an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, AppError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        Self::build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let mut raw: serde_json::Value = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to read config: {e}")))?;
        placeholders::resolve_env_placeholders(&mut raw);

        serde_json::from_value(raw)
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Check invariants the coordination layer relies on.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.coordination.lock_ttl_seconds == 0 {
            return Err(AppError::validation(
                "coordination.lock_ttl_seconds must be greater than zero",
            ));
        }

        let mut seen = HashSet::new();
        for (index, job) in self.jobs.iter().enumerate() {
            let name = job.display_name().ok_or_else(|| {
                AppError::validation(format!("Job #{} requires a 'name'", index + 1))
            })?;
            if name.contains('|') || name.contains('\n') {
                return Err(AppError::validation(format!(
                    "Job name '{}' must not contain '|' or newlines",
                    name.escape_debug()
                )));
            }
            if !seen.insert(name) {
                return Err(AppError::validation(format!("Duplicate job name '{name}'")));
            }
        }
        Ok(())
    }

    /// Find a job by its display name.
    pub fn find_job(&self, name: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|j| j.display_name() == Some(name))
    }
}
