//! Config struct definition and default implementation.

use super::types::*;
use crate::remote::SshConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global settings for every book run by this process.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Resume store
    // =========================================================================
    /// Directory for pose, repo, journal and saved layouts.
    /// Defaults to the system temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    // =========================================================================
    // Remote execution
    // =========================================================================
    /// Lowest layer of the ssh config merge; books, sections, steps and
    /// statements override it field by field.
    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,

    #[serde(default = "default_scp_binary")]
    pub scp_binary: String,

    // =========================================================================
    // Terminal
    // =========================================================================
    #[serde(default = "default_tmux_binary")]
    pub tmux_binary: String,

    // =========================================================================
    // Logging
    // =========================================================================
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: None,
            ssh: SshConfig::default(),
            ssh_binary: default_ssh_binary(),
            scp_binary: default_scp_binary(),
            tmux_binary: default_tmux_binary(),
            log_filter: default_log_filter(),
        }
    }
}
