use crate::position::PositionEntry;
use crate::statements::Variables;
use serde::{Deserialize, Serialize};

/// Snapshot of the tree a stored pose refers to, and the variables captured
/// so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub title: String,
    pub outline: Vec<PositionEntry>,
    #[serde(default)]
    pub variables: Variables,
}

impl Repo {
    pub fn new(title: impl Into<String>, outline: Vec<PositionEntry>) -> Self {
        Self {
            title: title.into(),
            outline,
            variables: Variables::new(),
        }
    }

    /// Whether `outline` still describes the same tree.
    pub fn matches(&self, outline: &[PositionEntry]) -> bool {
        self.outline == outline
    }
}
