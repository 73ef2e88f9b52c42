#![deny(unsafe_code)]

//! Configuration loading and validation for the CSI mock driver.
//!
//! Driver settings come from three places: an optional TOML file, command-line
//! flags layered on top of it by the binary, and the `CSI_*` environment
//! variables that select where the driver listens. The [`DriverConfig`] built
//! from them is handed to the service instance once and never mutated again.

/// Endpoint addresses and credential mode read from the environment.
pub mod env;
/// Strictly-parsed hooks document.
pub mod hooks;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub use env::EndpointSettings;
pub use hooks::{HookPoint, Hooks, HooksError};

/// Driver name advertised when `--name` is not given.
pub const DEFAULT_DRIVER_NAME: &str = "io.kubernetes.storage.mock";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level configuration file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Driver capability settings.
    #[serde(default)]
    pub driver: DriverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Capability flags and identity of the mock driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Name reported to callers through the identity role.
    #[serde(default = "default_driver_name")]
    pub name: String,

    /// Omit the publish/unpublish capability from the controller role.
    #[serde(default)]
    pub disable_attach: bool,

    /// Number of volumes that may be attached to a single node.
    #[serde(default = "default_attach_limit")]
    pub attach_limit: i64,

    /// Advertise node-side volume expansion.
    #[serde(default)]
    pub node_expansion_required: bool,

    /// Advertise accessibility constraints (topology).
    #[serde(default)]
    pub enable_topology: bool,

    /// Omit controller-side volume expansion.
    #[serde(default)]
    pub disable_controller_expansion: bool,

    /// Forbid expanding a volume while it is attached.
    #[serde(default)]
    pub disable_online_expansion: bool,

    /// Let the caller pre-create the publish target path.
    #[serde(default)]
    pub permissive_target_path: bool,

    /// YAML document describing hook scripts.
    #[serde(default)]
    pub hooks_file: Option<PathBuf>,

    /// Hooks loaded from `hooks_file`, if it parsed.
    #[serde(skip)]
    pub hooks: Option<Hooks>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: default_driver_name(),
            disable_attach: false,
            attach_limit: default_attach_limit(),
            node_expansion_required: false,
            enable_topology: false,
            disable_controller_expansion: false,
            disable_online_expansion: false,
            permissive_target_path: false,
            hooks_file: None,
            hooks: None,
        }
    }
}

fn default_driver_name() -> String {
    DEFAULT_DRIVER_NAME.to_string()
}

fn default_attach_limit() -> i64 {
    2
}

impl DriverConfig {
    /// Load the hooks document named by `hooks_file`.
    ///
    /// A document that cannot be read or parsed is logged and ignored: the
    /// driver keeps running without hooks.
    pub async fn resolve_hooks(&mut self) {
        let Some(path) = self.hooks_file.clone() else {
            return;
        };
        match Hooks::load(&path).await {
            Ok(hooks) => {
                debug!(path = %path.display(), "Hooks file loaded");
                self.hooks = Some(hooks);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load hooks file");
                self.hooks = None;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Validation(
                "driver.name must not be empty".to_string(),
            ));
        }
        if self.attach_limit < 0 {
            return Err(ConfigError::Validation(format!(
                "driver.attach_limit must not be negative, got {}",
                self.attach_limit
            )));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.driver.validate()?;
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }
        Ok(())
    }
}
