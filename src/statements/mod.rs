//! Statements: the units of work inside setups and steps.
//!
//! A [`Statement`] wraps one [`StatementKind`] together with the bookkeeping
//! the walker needs: whether the instance was synthesized at run time
//! (`dynamic`), whether it has been dispatched (`visited`), and the dynamic
//! statements it spawned.

mod types;


use crate::error::{Result, RunbookError};
use serde::{Deserialize, Deserializer};

pub use types::{
    Ask, Assert, Callback, CallbackFn, Capture, CaptureAll, Command, Condition, Confirm,
    Description, Download, Layout, Note, Notice, Predicate, PredicateFn, Rollback, TmuxCommand,
    Upload, Variables, Wait,
};

/// Every statement variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Ask(Ask),
    Assert(Assert),
    Capture(Capture),
    CaptureAll(CaptureAll),
    Command(Command),
    Condition(Condition),
    Confirm(Confirm),
    Description(Description),
    Download(Download),
    Layout(Layout),
    Note(Note),
    Notice(Notice),
    #[serde(skip)]
    Callback(Callback),
    TmuxCommand(TmuxCommand),
    Upload(Upload),
    Wait(Wait),
    Rollback(Rollback),
}

impl StatementKind {
    /// Stable snake_case name, as used in book files.
    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::Ask(_) => "ask",
            StatementKind::Assert(_) => "assert",
            StatementKind::Capture(_) => "capture",
            StatementKind::CaptureAll(_) => "capture_all",
            StatementKind::Command(_) => "command",
            StatementKind::Condition(_) => "condition",
            StatementKind::Confirm(_) => "confirm",
            StatementKind::Description(_) => "description",
            StatementKind::Download(_) => "download",
            StatementKind::Layout(_) => "layout",
            StatementKind::Note(_) => "note",
            StatementKind::Notice(_) => "notice",
            StatementKind::Callback(_) => "callback",
            StatementKind::TmuxCommand(_) => "tmux_command",
            StatementKind::Upload(_) => "upload",
            StatementKind::Wait(_) => "wait",
            StatementKind::Rollback(_) => "rollback",
        }
    }

    /// One-line summary used in outlines and logs.
    pub fn label(&self) -> String {
        match self {
            StatementKind::Ask(s) => s.prompt.clone(),
            StatementKind::Assert(s) => s.cmd.clone(),
            StatementKind::Capture(s) => s.cmd.clone(),
            StatementKind::CaptureAll(s) => s.cmd.clone(),
            StatementKind::Command(s) => s.cmd.clone(),
            StatementKind::Condition(s) => s.predicate.describe(),
            StatementKind::Confirm(s) => s.prompt.clone(),
            StatementKind::Description(s) => s.msg.clone(),
            StatementKind::Download(s) => s.from.clone(),
            StatementKind::Layout(s) => s.name.clone().unwrap_or_else(|| "layout".to_string()),
            StatementKind::Note(s) => s.msg.clone(),
            StatementKind::Notice(s) => s.msg.clone(),
            StatementKind::Callback(s) => s.label.clone(),
            StatementKind::TmuxCommand(s) => s.cmd.clone(),
            StatementKind::Upload(s) => s.to.clone(),
            StatementKind::Wait(s) => format!("{}s", s.time),
            StatementKind::Rollback(s) => s.msg.clone(),
        }
    }

    /// Check field values before any walk starts.
    pub fn validate(&self) -> Result<()> {
        match self {
            StatementKind::Ask(s) => {
                types::require(&s.prompt, "ask prompt")?;
                types::require(&s.into, "ask target variable")
            }
            StatementKind::Assert(s) => {
                types::require(&s.cmd, "assert command")?;
                if s.attempts == Some(0) {
                    return Err(RunbookError::ValidationError(format!(
                        "assert `{}`: attempts must be greater than 0",
                        s.cmd
                    )));
                }
                if let Some(ssh) = &s.ssh_config {
                    ssh.validate()?;
                }
                match &s.abort_statement {
                    Some(abort) => abort.kind.validate(),
                    None => Ok(()),
                }
            }
            StatementKind::Capture(s) => {
                types::require(&s.cmd, "capture command")?;
                types::require(&s.into, "capture target variable")?;
                s.ssh_config.as_ref().map_or(Ok(()), |c| c.validate())
            }
            StatementKind::CaptureAll(s) => {
                types::require(&s.cmd, "capture_all command")?;
                types::require(&s.into, "capture_all target variable")?;
                s.ssh_config.as_ref().map_or(Ok(()), |c| c.validate())
            }
            StatementKind::Command(s) => {
                types::require(&s.cmd, "command")?;
                s.ssh_config.as_ref().map_or(Ok(()), |c| c.validate())
            }
            StatementKind::Condition(s) => {
                if let Predicate::Command { cmd, .. } = &s.predicate {
                    types::require(cmd, "condition command")?;
                }
                s.then
                    .iter()
                    .chain(s.otherwise.iter())
                    .try_for_each(|statement| statement.kind.validate())
            }
            StatementKind::Confirm(s) => types::require(&s.prompt, "confirm prompt"),
            StatementKind::Download(s) => {
                types::require(&s.from, "download source")?;
                s.ssh_config.as_ref().map_or(Ok(()), |c| c.validate())
            }
            StatementKind::Upload(s) => {
                types::require(&s.from.to_string_lossy(), "upload source")?;
                types::require(&s.to, "upload destination")?;
                s.ssh_config.as_ref().map_or(Ok(()), |c| c.validate())
            }
            StatementKind::Layout(s) => crate::tmux::layout::validate(s),
            StatementKind::TmuxCommand(s) => {
                types::require(&s.cmd, "tmux command")?;
                types::require(&s.pane, "tmux command pane")
            }
            StatementKind::Description(_)
            | StatementKind::Note(_)
            | StatementKind::Notice(_)
            | StatementKind::Callback(_)
            | StatementKind::Wait(_)
            | StatementKind::Rollback(_) => Ok(()),
        }
    }
}

/// A statement instance in the tree.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    dynamic: bool,
    visited: bool,
    spawned: Vec<Statement>,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            dynamic: false,
            visited: false,
            spawned: Vec::new(),
        }
    }

    /// A fresh run-time instance with the same content.
    pub fn into_dynamic(self) -> Self {
        Self {
            kind: self.kind,
            dynamic: true,
            visited: false,
            spawned: Vec::new(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn is_visited(&self) -> bool {
        self.visited
    }

    pub fn mark_dynamic(&mut self) {
        self.dynamic = true;
    }

    pub fn mark_visited(&mut self) {
        self.visited = true;
    }

    /// Dynamic statements spawned by this instance, in spawn order.
    pub fn spawned(&self) -> &[Statement] {
        &self.spawned
    }

    pub(crate) fn spawned_mut(&mut self) -> &mut Vec<Statement> {
        &mut self.spawned
    }
}

/// Book files write statements as single-key maps (`command: {cmd: ...}`).
impl<'de> Deserialize<'de> for Statement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_yaml::with::singleton_map::deserialize(deserializer).map(Statement::new)
    }
}

impl From<StatementKind> for Statement {
    fn from(kind: StatementKind) -> Self {
        Statement::new(kind)
    }
}

macro_rules! statement_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Statement {
                fn from(value: $variant) -> Self {
                    Statement::new(StatementKind::$variant(value))
                }
            }
        )*
    };
}

statement_from!(
    Ask, Assert, Capture, CaptureAll, Command, Condition, Confirm, Description, Download, Layout,
    Note, Notice, Callback, TmuxCommand, Upload, Wait, Rollback,
);
