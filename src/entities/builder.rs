//! Fluent construction of books.
//!
//! Each builder appends typed nodes to its parent's child list in call order,
//! which is also execution order.
//!
//! ```
//! use runbook::entities::Book;
//!
//! let book = Book::builder("Restart web")
//!     .section("Drain", |section| {
//!         section.step("Disable traffic", |step| step.command("lb disable web1"))
//!     })
//!     .step("Restart", |step| step.confirm("Restart now?").command("systemctl restart web"))
//!     .build()?;
//! assert_eq!(book.children.len(), 2);
//! # Ok::<(), runbook::error::RunbookError>(())
//! ```

use super::{Book, Node, Section, Setup, Step};
use crate::error::Result;
use crate::remote::SshConfig;
use crate::statements::{
    Ask, Callback, Capture, Command, Confirm, Description, Download, Note, Notice, Rollback,
    Statement, TmuxCommand, Upload, Variables, Wait,
};
use std::path::PathBuf;

/// Builds a [`Book`]; validated on [`BookBuilder::build`].
#[derive(Debug)]
pub struct BookBuilder {
    book: Book,
}

impl BookBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            book: Book {
                title: title.into(),
                ssh_config: None,
                children: Vec::new(),
            },
        }
    }

    pub fn ssh_config(mut self, ssh_config: SshConfig) -> Self {
        self.book.ssh_config = Some(ssh_config);
        self
    }

    pub fn section(mut self, title: impl Into<String>, f: impl FnOnce(SectionBuilder) -> SectionBuilder) -> Self {
        self.book.children.push(Node::Section(f(SectionBuilder::new(title)).section));
        self
    }

    pub fn setup(mut self, f: impl FnOnce(StepBuilder) -> StepBuilder) -> Self {
        self.book.children.push(Node::Setup(f(StepBuilder::new(None)).into_setup()));
        self
    }

    pub fn step(mut self, title: impl Into<String>, f: impl FnOnce(StepBuilder) -> StepBuilder) -> Self {
        self.book.children.push(Node::Step(f(StepBuilder::new(Some(title.into()))).step));
        self
    }

    pub fn build(self) -> Result<Book> {
        self.book.validate()?;
        Ok(self.book)
    }
}

/// Builds a [`Section`].
#[derive(Debug)]
pub struct SectionBuilder {
    section: Section,
}

impl SectionBuilder {
    fn new(title: impl Into<String>) -> Self {
        Self {
            section: Section {
                title: title.into(),
                ssh_config: None,
                children: Vec::new(),
            },
        }
    }

    pub fn ssh_config(mut self, ssh_config: SshConfig) -> Self {
        self.section.ssh_config = Some(ssh_config);
        self
    }

    pub fn section(mut self, title: impl Into<String>, f: impl FnOnce(SectionBuilder) -> SectionBuilder) -> Self {
        self.section.children.push(Node::Section(f(SectionBuilder::new(title)).section));
        self
    }

    pub fn setup(mut self, f: impl FnOnce(StepBuilder) -> StepBuilder) -> Self {
        self.section.children.push(Node::Setup(f(StepBuilder::new(None)).into_setup()));
        self
    }

    pub fn step(mut self, title: impl Into<String>, f: impl FnOnce(StepBuilder) -> StepBuilder) -> Self {
        self.section.children.push(Node::Step(f(StepBuilder::new(Some(title.into()))).step));
        self
    }
}

/// Builds a [`Step`] (or the statements of a [`Setup`]).
#[derive(Debug)]
pub struct StepBuilder {
    step: Step,
}

impl StepBuilder {
    fn new(title: Option<String>) -> Self {
        Self {
            step: Step {
                title,
                parallel: false,
                ssh_config: None,
                statements: Vec::new(),
            },
        }
    }

    fn into_setup(self) -> Setup {
        Setup {
            title: self.step.title.unwrap_or_else(super::default_setup_title),
            statements: self.step.statements,
        }
    }

    pub fn parallel(mut self) -> Self {
        self.step.parallel = true;
        self
    }

    pub fn ssh_config(mut self, ssh_config: SshConfig) -> Self {
        self.step.ssh_config = Some(ssh_config);
        self
    }

    /// Append any statement.
    pub fn statement(mut self, statement: impl Into<Statement>) -> Self {
        self.step.statements.push(statement.into());
        self
    }

    pub fn command(self, cmd: impl Into<String>) -> Self {
        self.statement(Command::new(cmd))
    }

    pub fn note(self, msg: impl Into<String>) -> Self {
        self.statement(Note { msg: msg.into() })
    }

    pub fn notice(self, msg: impl Into<String>) -> Self {
        self.statement(Notice { msg: msg.into() })
    }

    pub fn description(self, msg: impl Into<String>) -> Self {
        self.statement(Description { msg: msg.into() })
    }

    pub fn ask(self, prompt: impl Into<String>, into: impl Into<String>) -> Self {
        self.statement(Ask {
            prompt: prompt.into(),
            into: into.into(),
            default: None,
        })
    }

    pub fn confirm(self, prompt: impl Into<String>) -> Self {
        self.statement(Confirm {
            prompt: prompt.into(),
            rollback_on_decline: false,
        })
    }

    pub fn capture(self, cmd: impl Into<String>, into: impl Into<String>) -> Self {
        self.statement(Capture::new(cmd, into))
    }

    pub fn wait(self, seconds: u64) -> Self {
        self.statement(Wait { time: seconds })
    }

    pub fn upload(self, from: impl Into<PathBuf>, to: impl Into<String>) -> Self {
        self.statement(Upload {
            from: from.into(),
            to: to.into(),
            ssh_config: None,
        })
    }

    pub fn download(self, from: impl Into<String>, to: impl Into<PathBuf>) -> Self {
        self.statement(Download {
            from: from.into(),
            to: Some(to.into()),
            ssh_config: None,
        })
    }

    pub fn tmux_command(self, cmd: impl Into<String>, pane: impl Into<String>) -> Self {
        self.statement(TmuxCommand {
            cmd: cmd.into(),
            pane: pane.into(),
        })
    }

    pub fn rollback(self, msg: impl Into<String>) -> Self {
        self.statement(Rollback { msg: msg.into() })
    }

    pub fn callback<F>(self, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Variables) -> Result<Vec<Statement>> + Send + Sync + 'static,
    {
        self.statement(Callback::new(label, f))
    }
}
