//! The book tree: Book → Sections/Setups/Steps → Statements.
//!
//! Books are either assembled with [`BookBuilder`] or loaded from a YAML book
//! file with [`Book::load`]. Either way [`Book::validate`] runs before a walk.

mod builder;
mod io;


use crate::error::{Result, RunbookError};
use crate::remote::SshConfig;
use crate::statements::Statement;
use serde::Deserialize;

pub use builder::{BookBuilder, SectionBuilder, StepBuilder};

/// Root of a runbook.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Book {
    pub title: String,
    /// Defaults for every command in the book.
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// Grouping of steps; may nest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
    #[serde(default)]
    pub children: Vec<Node>,
}

/// Statements that run on every walk, including resumed ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Setup {
    #[serde(default = "default_setup_title")]
    pub title: String,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

fn default_setup_title() -> String {
    "Setup".to_string()
}

/// Leaf container of statements.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    #[serde(default)]
    pub title: Option<String>,
    /// Run every command of this step on all hosts at once.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub ssh_config: Option<SshConfig>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// A child of a book or section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Section(Section),
    Setup(Setup),
    Step(Step),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Section(_) => "section",
            Node::Setup(_) => "setup",
            Node::Step(_) => "step",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Node::Section(section) => &section.title,
            Node::Setup(setup) => &setup.title,
            Node::Step(step) => step.title.as_deref().unwrap_or(""),
        }
    }
}

impl Book {
    pub fn builder(title: impl Into<String>) -> BookBuilder {
        BookBuilder::new(title)
    }

    /// Reject malformed trees before any handler runs.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(RunbookError::ValidationError(
                "book title must not be empty".to_string(),
            ));
        }
        if let Some(ssh) = &self.ssh_config {
            ssh.validate()?;
        }
        self.children.iter().try_for_each(validate_node)
    }
}

fn validate_node(node: &Node) -> Result<()> {
    match node {
        Node::Section(section) => {
            if section.title.trim().is_empty() {
                return Err(RunbookError::ValidationError(
                    "section title must not be empty".to_string(),
                ));
            }
            if let Some(ssh) = &section.ssh_config {
                ssh.validate()?;
            }
            section.children.iter().try_for_each(validate_node)
        }
        Node::Setup(setup) => validate_statements(&setup.statements),
        Node::Step(step) => {
            if let Some(ssh) = &step.ssh_config {
                ssh.validate()?;
            }
            validate_statements(&step.statements)
        }
    }
}

fn validate_statements(statements: &[Statement]) -> Result<()> {
    statements
        .iter()
        .try_for_each(|statement| statement.kind.validate())
}
