//! Field sets of the individual statement variants.

use super::Statement;
use crate::error::{Result, RunbookError};
use crate::remote::SshConfig;
use crate::tmux::layout::{LayoutNode, WindowLayout};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Values captured by `ask`, `capture` and `capture_all`, keyed by `into`.
pub type Variables = BTreeMap<String, Value>;

/// Prompt the operator and store the answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ask {
    pub prompt: String,
    pub into: String,
    /// Used in auto mode and when the answer is empty.
    #[serde(default)]
    pub default: Option<String>,
}

/// Poll a command until it succeeds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Assert {
    pub cmd: String,
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
    #[serde(default)]
    pub raw: bool,
    /// Seconds between failed attempts.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Seconds each attempt may run; 0 disables the limit.
    #[serde(default)]
    pub timeout: u64,
    /// Maximum attempts; unset retries until success or cancellation.
    #[serde(default)]
    pub attempts: Option<u32>,
    /// Dispatched once when every attempt failed.
    #[serde(default)]
    pub abort_statement: Option<Box<Statement>>,
}

fn default_interval() -> u64 {
    1
}

impl Assert {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ssh_config: None,
            raw: false,
            interval: default_interval(),
            timeout: 0,
            attempts: None,
            abort_statement: None,
        }
    }

    pub fn interval(mut self, seconds: u64) -> Self {
        self.interval = seconds;
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn abort_statement(mut self, statement: impl Into<Statement>) -> Self {
        self.abort_statement = Some(Box::new(statement.into()));
        self
    }
}

/// Run a command on the first host and store its output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capture {
    pub cmd: String,
    pub into: String,
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
    #[serde(default)]
    pub raw: bool,
    #[serde(default = "default_true")]
    pub strip: bool,
}

impl Capture {
    pub fn new(cmd: impl Into<String>, into: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            into: into.into(),
            ssh_config: None,
            raw: false,
            strip: true,
        }
    }
}

/// Run a command on every host and store a host → output map.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureAll {
    pub cmd: String,
    pub into: String,
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
    #[serde(default)]
    pub raw: bool,
    #[serde(default = "default_true")]
    pub strip: bool,
}

fn default_true() -> bool {
    true
}

/// Run a shell command on the configured hosts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Command {
    pub cmd: String,
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
    /// Send `cmd` verbatim instead of quoting it into a wrapper.
    #[serde(default)]
    pub raw: bool,
    /// Command run instead of `cmd` when the step executes in reverse.
    #[serde(default)]
    pub undo: Option<String>,
}

impl Command {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ssh_config: None,
            raw: false,
            undo: None,
        }
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    pub fn undo(mut self, cmd: impl Into<String>) -> Self {
        self.undo = Some(cmd.into());
        self
    }

    pub fn on(mut self, ssh_config: SshConfig) -> Self {
        self.ssh_config = Some(ssh_config);
        self
    }
}

/// In-process predicate used by [`Predicate::Callback`].
pub type PredicateFn = Arc<dyn Fn(&Variables) -> bool + Send + Sync>;

/// How a [`Condition`] decides which branch to take.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Predicate {
    /// True when the command exits with status 0 on the first host.
    Command {
        cmd: String,
        #[serde(default)]
        raw: bool,
    },
    /// True when a captured variable equals `equals`.
    Variable { name: String, equals: Value },
    #[serde(skip)]
    Callback(PredicateFn),
}

impl Predicate {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&Variables) -> bool + Send + Sync + 'static,
    {
        Predicate::Callback(Arc::new(f))
    }

    pub fn describe(&self) -> String {
        match self {
            Predicate::Command { cmd, .. } => format!("`{}` succeeds", cmd),
            Predicate::Variable { name, equals } => format!("{} == {}", name, equals),
            Predicate::Callback(_) => "code block returns true".to_string(),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.describe())
    }
}

/// Branch at run time; the chosen branch is spawned as dynamic statements.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub predicate: Predicate,
    #[serde(default)]
    pub then: Vec<Statement>,
    #[serde(default, rename = "else")]
    pub otherwise: Vec<Statement>,
}

impl Condition {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            then: Vec::new(),
            otherwise: Vec::new(),
        }
    }

    pub fn then(mut self, statement: impl Into<Statement>) -> Self {
        self.then.push(statement.into());
        self
    }

    pub fn otherwise(mut self, statement: impl Into<Statement>) -> Self {
        self.otherwise.push(statement.into());
        self
    }
}

/// Ask the operator for a yes/no confirmation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Confirm {
    pub prompt: String,
    /// Declining switches the rest of the walk into reverse instead of failing.
    #[serde(default)]
    pub rollback_on_decline: bool,
}

/// Free-form text rendered as part of the book.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Description {
    pub msg: String,
}

/// Informational message.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Note {
    pub msg: String,
}

/// Warning-level message.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Notice {
    pub msg: String,
}

/// Copy a remote file to the local machine.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Download {
    pub from: String,
    /// Local destination; defaults to the remote file name.
    #[serde(default)]
    pub to: Option<PathBuf>,
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
}

impl Download {
    pub fn local_path(&self) -> PathBuf {
        match &self.to {
            Some(to) => to.clone(),
            None => PathBuf::from(
                self.from
                    .rsplit('/')
                    .find(|part| !part.is_empty())
                    .unwrap_or(self.from.as_str()),
            ),
        }
    }
}

/// Copy a local file to every host.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Upload {
    pub from: PathBuf,
    pub to: String,
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
}

/// Arrange terminal panes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    /// Rename the current window.
    #[serde(default)]
    pub name: Option<String>,
    /// Panes of the current window.
    #[serde(default)]
    pub structure: Vec<LayoutNode>,
    /// Additional windows.
    #[serde(default)]
    pub windows: Vec<WindowLayout>,
}

/// Type a command into a named pane.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TmuxCommand {
    pub cmd: String,
    pub pane: String,
}

/// Pause the walk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Wait {
    /// Seconds.
    pub time: u64,
}

/// Switch every following step into reverse.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rollback {
    pub msg: String,
}

/// Body of a [`Callback`]; may return statements to run right after it.
pub type CallbackFn = dyn Fn(&mut Variables) -> Result<Vec<Statement>> + Send + Sync;

/// In-process code block.
#[derive(Clone)]
pub struct Callback {
    pub label: String,
    func: Arc<CallbackFn>,
}

impl Callback {
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Variables) -> Result<Vec<Statement>> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    pub fn call(&self, variables: &mut Variables) -> Result<Vec<Statement>> {
        (self.func)(variables)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("label", &self.label).finish()
    }
}

pub(super) fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RunbookError::ValidationError(format!("{} must not be empty", what)));
    }
    Ok(())
}
