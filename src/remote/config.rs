//! Per-node remote execution settings and their field-wise merge.

use crate::error::{Result, RunbookError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pseudo-host used when no servers are configured: commands run locally.
pub const LOCAL_HOST: &str = "local";

/// Where and how commands run.
///
/// Every field is optional so that configs can be layered: statement over step
/// over section over book over the global config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshConfig {
    /// `host` or `host:port`, optionally prefixed by `user@`.
    pub servers: Vec<String>,
    pub parallelization: Option<Parallelization>,
    /// Remote working directory.
    pub path: Option<String>,
    /// Run as this user through sudo.
    pub user: Option<String>,
    /// Run with this group through sg.
    pub group: Option<String>,
    pub umask: Option<String>,
    /// Exported into the command environment; keys are upper-cased.
    pub env: BTreeMap<String, String>,
}

/// Host fan-out strategy for one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parallelization {
    pub strategy: Strategy,
    /// Hosts per wave for [`Strategy::Groups`].
    pub limit: usize,
    /// Seconds between waves for [`Strategy::Groups`].
    pub wait: u64,
}

impl Default for Parallelization {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            limit: 2,
            wait: 2,
        }
    }
}

/// How hosts are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One host at a time, stopping at the first failure.
    #[default]
    Sequential,
    /// All hosts at once.
    Parallel,
    /// Waves of `limit` hosts with a pause in between.
    Groups,
}

/// The wrapper-relevant subset of an [`SshConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOptions {
    pub path: Option<String>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub umask: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl SshConfig {
    pub fn with_servers<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Layer `self` over `base`: set fields win, `env` maps are combined.
    pub fn merged_over(&self, base: &SshConfig) -> SshConfig {
        let mut env = base.env.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        SshConfig {
            servers: if self.servers.is_empty() {
                base.servers.clone()
            } else {
                self.servers.clone()
            },
            parallelization: self
                .parallelization
                .clone()
                .or_else(|| base.parallelization.clone()),
            path: self.path.clone().or_else(|| base.path.clone()),
            user: self.user.clone().or_else(|| base.user.clone()),
            group: self.group.clone().or_else(|| base.group.clone()),
            umask: self.umask.clone().or_else(|| base.umask.clone()),
            env,
        }
    }

    /// Merge an optional override over `self`.
    pub fn layered(&self, over: Option<&SshConfig>) -> SshConfig {
        match over {
            Some(over) => over.merged_over(self),
            None => self.clone(),
        }
    }

    /// Target hosts; [`LOCAL_HOST`] when none are configured.
    pub fn hosts(&self) -> Vec<String> {
        if self.servers.is_empty() {
            vec![LOCAL_HOST.to_string()]
        } else {
            self.servers.clone()
        }
    }

    pub fn parallelization(&self) -> Parallelization {
        self.parallelization.clone().unwrap_or_default()
    }

    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            path: self.path.clone(),
            user: self.user.clone(),
            group: self.group.clone(),
            umask: self.umask.clone(),
            env: self.env.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.iter().any(|s| s.trim().is_empty()) {
            return Err(RunbookError::ValidationError(
                "ssh_config servers must not contain empty entries".to_string(),
            ));
        }
        if let Some(parallelization) = &self.parallelization {
            if parallelization.limit == 0 {
                return Err(RunbookError::ValidationError(
                    "ssh_config parallelization limit must be greater than 0".to_string(),
                ));
            }
        }
        if let Some(umask) = &self.umask {
            if umask.is_empty() || !umask.chars().all(|c| c.is_digit(8)) {
                return Err(RunbookError::ValidationError(format!(
                    "ssh_config umask '{}' is not an octal mask",
                    umask
                )));
            }
        }
        if let Some(key) = self.env.keys().find(|k| !is_env_name(k)) {
            return Err(RunbookError::ValidationError(format!(
                "ssh_config env key '{}' is not a valid variable name",
                key
            )));
        }
        Ok(())
    }
}

fn is_env_name(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
