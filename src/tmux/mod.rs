//! Terminal multiplexer plumbing.
//!
//! [`Tmux`] wraps the handful of tmux commands the runbook needs. Every call
//! goes through a [`Multiplexer`], which returns the command's stdout as a
//! single trimmed token (a pane or window id for the creating commands).

pub mod layout;


use crate::error::{Result, RunbookError};
use crate::slug::slug;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

pub use layout::{LayoutEngine, LayoutNode, WindowLayout};

/// Keys typed before every command to leave pagers and clear the prompt line.
pub const PAGER_ESCAPE_SEQUENCE: &str = "q C-u";

/// Named panes created by layouts: name → pane id.
pub type PaneMap = BTreeMap<String, String>;

/// Runs one multiplexer command.
pub trait Multiplexer {
    fn run(&self, args: &[&str]) -> Result<String>;
}

/// The `tmux` binary.
#[derive(Debug, Clone)]
pub struct TmuxCli {
    binary: String,
}

impl Default for TmuxCli {
    fn default() -> Self {
        Self::new("tmux")
    }
}

impl TmuxCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Multiplexer for TmuxCli {
    fn run(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(args = ?args, "tmux");
        let output = Command::new(&self.binary).args(args).output().map_err(|e| {
            RunbookError::MultiplexerError(format!("failed to run '{}': {}", self.binary, e))
        })?;

        if !output.status.success() {
            return Err(RunbookError::MultiplexerError(format!(
                "{} {} failed: {}",
                self.binary,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// High-level tmux operations used by layouts and `tmux_command` statements.
pub struct Tmux<'a> {
    mux: &'a dyn Multiplexer,
    /// `$TMUX_PANE` of the process that started the runbook.
    origin_pane: Option<String>,
    runbook_pane: OnceCell<String>,
    tmp_dir: PathBuf,
}

impl<'a> Tmux<'a> {
    pub fn new(mux: &'a dyn Multiplexer, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            mux,
            origin_pane: None,
            runbook_pane: OnceCell::new(),
            tmp_dir: tmp_dir.into(),
        }
    }

    pub fn with_origin_pane(mut self, pane: Option<String>) -> Self {
        self.origin_pane = pane;
        self
    }

    /// The pane the runbook itself runs in. Looked up once.
    pub fn runbook_pane(&self) -> Result<String> {
        if let Some(pane) = self.runbook_pane.get() {
            return Ok(pane.clone());
        }
        let pane = self.mux.run(&["display-message", "-p", "#D"])?;
        Ok(self.runbook_pane.get_or_init(|| pane).clone())
    }

    pub fn rename_window(&self, name: &str) -> Result<()> {
        self.mux.run(&["rename-window", name]).map(|_| ())
    }

    /// Split `pane`, giving the new pane `size` percent. Returns the new pane id.
    pub fn split(&self, pane: &str, depth: usize, size: u32) -> Result<String> {
        let direction = if depth % 2 == 0 { "-h" } else { "-v" };
        let size = size.to_string();
        self.mux.run(&[
            "split-window",
            direction,
            "-t",
            pane,
            "-p",
            &size,
            "-P",
            "-F",
            "#D",
            "-d",
        ])
    }

    pub fn swap_panes(&self, source: &str, target: &str) -> Result<()> {
        self.mux
            .run(&["swap-pane", "-d", "-t", source, "-s", target])
            .map(|_| ())
    }

    pub fn set_directory(&self, directory: &str, pane: &str) -> Result<()> {
        self.send_keys(&format!("cd {}; clear", shell_words::quote(directory)), pane)
    }

    /// Returns the id of the new window's first pane.
    pub fn new_window(&self, name: &str) -> Result<String> {
        self.mux
            .run(&["new-window", "-n", name, "-P", "-F", "#D", "-d"])
    }

    pub fn kill_pane(&self, pane: &str) -> Result<()> {
        self.mux.run(&["kill-pane", "-t", pane]).map(|_| ())
    }

    /// Type `keys` into `pane` and press enter, escaping pagers first.
    pub fn send_keys(&self, keys: &str, pane: &str) -> Result<()> {
        let mut args = vec!["send-keys", "-t", pane];
        args.extend(PAGER_ESCAPE_SEQUENCE.split(' '));
        args.push(keys);
        args.push("C-m");
        self.mux.run(&args).map(|_| ())
    }

    /// Where the pane layout of `title` is saved for this tmux pane.
    ///
    /// tmux expands the process id, session name, pane pid and pane id into
    /// the name, so each originating pane gets its own file.
    pub fn layout_file(&self, title: &str) -> Result<PathBuf> {
        let template = format!(
            "{}/runbook_layout_#{{pid}}_#{{session_name}}_#{{pane_pid}}_#{{pane_id}}_{}.yml",
            self.tmp_dir.display(),
            slug(title)
        );
        let mut args = vec!["display-message", "-p"];
        if let Some(pane) = &self.origin_pane {
            args.push("-t");
            args.push(pane.as_str());
        }
        args.push(template.as_str());
        self.mux.run(&args).map(PathBuf::from)
    }
}
