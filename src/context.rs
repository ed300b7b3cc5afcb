//! Execution context threaded through a walk.
//!
//! A [`RunState`] owns everything that is shared across the whole walk: the
//! rollback cells, the named pane registry and the captured variables. Each
//! node gets its own [`Context`] that borrows those cells and carries the
//! per-node scalars (depth, index, parent, position, effective ssh config).
//! Deriving a child context copies the scalars and re-borrows the cells, so a
//! flip of `reverse` anywhere is seen by every later node.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::position::Position;
use crate::remote::{Parallelization, SshConfig, Strategy};
use crate::statements::Variables;
use crate::tmux::PaneMap;
use crate::toolbox::Toolbox;
use std::cell::{Cell, RefCell};

/// A boolean cell shared by every context of a walk.
#[derive(Debug, Default)]
pub struct Glue(Cell<bool>);

impl Glue {
    pub fn new(value: bool) -> Self {
        Self(Cell::new(value))
    }

    pub fn get(&self) -> bool {
        self.0.get()
    }

    pub fn set(&self, value: bool) {
        self.0.set(value);
    }

    /// Invert the value and return the new one.
    pub fn flip(&self) -> bool {
        let value = !self.0.get();
        self.0.set(value);
        value
    }
}

/// The parent of a node, as seen from inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabel {
    pub kind: &'static str,
    pub title: String,
}

impl NodeLabel {
    pub fn new(kind: &'static str, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
        }
    }
}

/// Walk-wide options chosen by the operator.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    /// Describe effects instead of performing them.
    pub noop: bool,
    /// Never prompt: take defaults and confirm everything.
    pub auto: bool,
    /// Confirm every step before running it.
    pub paranoid: bool,
    /// Skip every node that sorts before this position.
    pub start_at: Option<Position>,
}

/// Cells shared by all contexts of one walk.
#[derive(Debug, Default)]
pub struct RunState {
    pub reverse: Glue,
    pub reversed: Glue,
    pub layout_panes: RefCell<PaneMap>,
    pub variables: RefCell<Variables>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with previously captured variables, e.g. from a resumed run.
    pub fn with_variables(variables: Variables) -> Self {
        Self {
            variables: RefCell::new(variables),
            ..Self::default()
        }
    }

    /// The context of the book itself.
    pub fn root<'a>(
        &'a self,
        flags: &'a RunFlags,
        toolbox: &'a dyn Toolbox,
        cancel: &'a CancelToken,
        book_title: &'a str,
        ssh_config: SshConfig,
    ) -> Context<'a> {
        Context {
            noop: flags.noop,
            auto: flags.auto,
            paranoid: flags.paranoid,
            start_at: flags.start_at.as_ref(),
            toolbox,
            layout_panes: &self.layout_panes,
            variables: &self.variables,
            depth: 0,
            index: 0,
            parent: None,
            position: Position::root(),
            reverse: &self.reverse,
            reversed: &self.reversed,
            book_title,
            ssh_config,
            parallel: false,
            cancel,
        }
    }
}

/// Per-node view of a walk.
#[derive(Clone)]
pub struct Context<'a> {
    pub noop: bool,
    pub auto: bool,
    pub paranoid: bool,
    pub start_at: Option<&'a Position>,
    pub toolbox: &'a dyn Toolbox,
    pub layout_panes: &'a RefCell<PaneMap>,
    pub variables: &'a RefCell<Variables>,
    pub depth: usize,
    /// Index among the parent's children.
    pub index: usize,
    pub parent: Option<NodeLabel>,
    pub position: Position,
    /// Set by rollback markers; read by every following step.
    pub reverse: &'a Glue,
    /// Whether the current step was entered in reverse.
    pub reversed: &'a Glue,
    pub book_title: &'a str,
    /// Effective ssh config of the enclosing containers.
    pub ssh_config: SshConfig,
    /// The enclosing step forces the parallel strategy.
    pub parallel: bool,
    pub cancel: &'a CancelToken,
}

impl<'a> Context<'a> {
    /// Context for the `index`-th child of this node.
    pub fn child(&self, index: usize, parent: NodeLabel) -> Context<'a> {
        Context {
            depth: self.depth + 1,
            index,
            parent: Some(parent),
            position: self.position.child(index),
            ..self.clone()
        }
    }

    /// Layer a container's ssh config over the inherited one.
    pub fn with_ssh_config(mut self, over: Option<&SshConfig>) -> Self {
        self.ssh_config = self.ssh_config.layered(over);
        self
    }

    /// The ssh config a statement runs with.
    pub fn effective_ssh(&self, over: Option<&SshConfig>) -> SshConfig {
        let mut config = self.ssh_config.layered(over);
        if self.parallel {
            config.parallelization = Some(Parallelization {
                strategy: Strategy::Parallel,
                ..config.parallelization.unwrap_or_default()
            });
        }
        config
    }

    /// Whether the position-based resume skips this node's handler.
    pub fn skipped_by_start(&self) -> bool {
        self.start_at.is_some_and(|start| self.position < *start)
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed.get()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("position", &self.position.to_string())
            .field("depth", &self.depth)
            .field("index", &self.index)
            .field("parent", &self.parent)
            .field("reverse", &self.reverse.get())
            .field("reversed", &self.reversed.get())
            .finish()
    }
}
