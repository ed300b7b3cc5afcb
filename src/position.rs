//! Dotted-path positions of nodes in a book.
//!
//! A position is the sequence of zero-based sibling indices leading from the
//! book to a node, rendered as `"1.2.0"`. The book itself sits at the empty
//! position. Positions order segment-wise, with a prefix sorting before all of
//! its descendants, which is exactly the lexicographic order of the index
//! vectors.

use crate::entities::{Book, Node};
use crate::error::{Result, RunbookError};
use crate::statements::Statement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Location of a node in the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Position(Vec<usize>);

impl Position {
    /// The position of the book.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// The position of the `index`-th child of this node.
    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }

    pub fn segments(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` lies inside the subtree rooted at `ancestor`.
    pub fn is_within(&self, ancestor: &Position) -> bool {
        self.0.starts_with(&ancestor.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl FromStr for Position {
    type Err = RunbookError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::root());
        }
        s.split('.')
            .map(|segment| {
                segment.parse::<usize>().map_err(|_| {
                    RunbookError::ValidationError(format!(
                        "invalid position '{}': segment '{}' is not a number",
                        s, segment
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl TryFrom<String> for Position {
    type Error = RunbookError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Position> for String {
    fn from(position: Position) -> Self {
        position.to_string()
    }
}

/// One node of the outline produced by [`compute_positions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub position: Position,
    /// Node or statement kind (`"book"`, `"step"`, `"command"`, ...).
    pub kind: String,
    /// Container title, or a short label for statements.
    pub title: String,
}

/// Assign a position to every static node in document order.
///
/// The result is a pure function of the tree shape: dynamic statements spawned
/// during a walk are not part of the outline.
pub fn compute_positions(book: &Book) -> Vec<PositionEntry> {
    let mut entries = vec![PositionEntry {
        position: Position::root(),
        kind: "book".to_string(),
        title: book.title.clone(),
    }];
    let root = Position::root();
    for (index, node) in book.children.iter().enumerate() {
        collect_node(node, root.child(index), &mut entries);
    }
    entries
}

fn collect_node(node: &Node, position: Position, entries: &mut Vec<PositionEntry>) {
    entries.push(PositionEntry {
        position: position.clone(),
        kind: node.kind().to_string(),
        title: node.title().to_string(),
    });
    match node {
        Node::Section(section) => {
            for (index, child) in section.children.iter().enumerate() {
                collect_node(child, position.child(index), entries);
            }
        }
        Node::Setup(setup) => collect_statements(&setup.statements, &position, entries),
        Node::Step(step) => collect_statements(&step.statements, &position, entries),
    }
}

fn collect_statements(statements: &[Statement], parent: &Position, entries: &mut Vec<PositionEntry>) {
    for (index, statement) in statements.iter().enumerate() {
        entries.push(PositionEntry {
            position: parent.child(index),
            kind: statement.kind.name().to_string(),
            title: statement.kind.label(),
        });
    }
}

/// The first statement strictly after `completed` in the outline.
///
/// Used to turn the stored "last completed" position into a start position.
pub fn next_statement_after<'a>(outline: &'a [PositionEntry], completed: &Position) -> Option<&'a PositionEntry> {
    outline
        .iter()
        .filter(|entry| is_statement_kind(&entry.kind))
        .find(|entry| entry.position > *completed && !entry.position.is_within(completed))
}

fn is_statement_kind(kind: &str) -> bool {
    !matches!(kind, "book" | "section" | "setup" | "step")
}
