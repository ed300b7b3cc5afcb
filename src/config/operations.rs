//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{Result, RunbookError};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

impl Config {
    /// Load config from a YAML file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(RunbookError::UserError)` - The file could not be read
    /// * `Err(RunbookError::ValidationError)` - Parse error or invalid value
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            RunbookError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map.
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }

        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            RunbookError::ValidationError(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            RunbookError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - binaries must be non-empty
    /// - `ssh` must pass [`SshConfig::validate`](crate::remote::SshConfig::validate)
    /// - `log_filter` must be a valid `tracing` filter directive
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ssh_binary", &self.ssh_binary),
            ("scp_binary", &self.scp_binary),
            ("tmux_binary", &self.tmux_binary),
        ] {
            if value.trim().is_empty() {
                return Err(RunbookError::ValidationError(format!(
                    "config: {} must not be empty",
                    name
                )));
            }
        }

        self.ssh.validate().map_err(|e| match e {
            RunbookError::ValidationError(msg) => {
                RunbookError::ValidationError(format!("config: ssh: {}", msg))
            }
            other => other,
        })?;

        EnvFilter::try_new(&self.log_filter).map_err(|e| {
            RunbookError::ValidationError(format!(
                "config: invalid log_filter '{}': {}",
                self.log_filter, e
            ))
        })?;

        Ok(())
    }

    /// Directory of the resume store.
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
