//! Pane layouts: declaration, validation and the recursive split algorithm.
//!
//! A structure is a list of children laid out side by side. Lists nested in
//! it alternate direction: depth 0 splits horizontally, depth 1 vertically,
//! and so on. A list of N children costs N-1 splits, each carving the next
//! child's share off the previously created pane.
//!
//! ```yaml
//! layout:
//!   name: deploy
//!   structure:
//!     - runbook
//!     - [ { name: logs, size: 60, command: "journalctl -f" }, shell ]
//! ```

use super::{PaneMap, Tmux};
use crate::error::{Result, RunbookError};
use crate::fs::atomic_write_file;
use crate::statements::Layout;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Name of the leaf that receives the runbook's own pane.
pub const RUNBOOK_PANE: &str = "runbook";

/// One entry of a layout structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LayoutNode {
    /// A pane known by name.
    Name(String),
    /// Children split in the alternate direction, sharing space equally.
    Split(Vec<LayoutNode>),
    /// Children split in the alternate direction, with an explicit size.
    Group(GroupSpec),
    Pane(PaneSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    /// Percentage of the parent.
    #[serde(default)]
    pub size: Option<u32>,
    pub panes: Vec<LayoutNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaneSpec {
    pub name: String,
    /// Percentage of the parent.
    #[serde(default)]
    pub size: Option<u32>,
    /// Working directory set right after creation.
    #[serde(default)]
    pub directory: Option<String>,
    /// Command typed into the pane after creation.
    #[serde(default)]
    pub command: Option<String>,
}

/// An additional window created by a layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowLayout {
    pub name: String,
    #[serde(default)]
    pub structure: Vec<LayoutNode>,
}

impl LayoutNode {
    pub fn pane(name: impl Into<String>) -> Self {
        LayoutNode::Name(name.into())
    }

    fn size(&self) -> Option<u32> {
        match self {
            LayoutNode::Name(_) | LayoutNode::Split(_) => None,
            LayoutNode::Group(group) => group.size,
            LayoutNode::Pane(pane) => pane.size,
        }
    }
}

/// Reject layouts that tmux could not honor.
pub fn validate(layout: &Layout) -> Result<()> {
    let mut names = BTreeSet::new();
    validate_children(&layout.structure, &mut names)?;
    for window in &layout.windows {
        if window.name.trim().is_empty() {
            return Err(invalid("window name must not be empty".to_string()));
        }
        validate_children(&window.structure, &mut names)?;
    }
    Ok(())
}

fn validate_children(children: &[LayoutNode], names: &mut BTreeSet<String>) -> Result<()> {
    let mut declared = 0;
    for child in children {
        if let Some(size) = child.size() {
            if !(1..=99).contains(&size) {
                return Err(invalid(format!("pane size {} is outside 1..=99", size)));
            }
            declared += size;
        }
        match child {
            LayoutNode::Name(name) => register_name(name, names)?,
            LayoutNode::Pane(pane) => register_name(&pane.name, names)?,
            LayoutNode::Split(nested) => validate_nested(nested, names)?,
            LayoutNode::Group(group) => validate_nested(&group.panes, names)?,
        }
    }
    if declared > 100 {
        return Err(invalid(format!("pane sizes add up to {}%", declared)));
    }
    Ok(())
}

fn validate_nested(children: &[LayoutNode], names: &mut BTreeSet<String>) -> Result<()> {
    if children.is_empty() {
        return Err(invalid("nested pane list must not be empty".to_string()));
    }
    validate_children(children, names)
}

fn register_name(name: &str, names: &mut BTreeSet<String>) -> Result<()> {
    if name.trim().is_empty() {
        return Err(invalid("pane name must not be empty".to_string()));
    }
    if !names.insert(name.to_string()) {
        return Err(invalid(format!("pane name '{}' is used twice", name)));
    }
    Ok(())
}

fn invalid(message: String) -> RunbookError {
    RunbookError::ValidationError(format!("layout: {}", message))
}

/// Percentages for each child: declared sizes are kept, the rest share what
/// is left equally (the last one absorbing rounding).
fn resolve_sizes(children: &[LayoutNode]) -> Vec<u32> {
    let declared: u32 = children.iter().filter_map(LayoutNode::size).sum();
    let missing = children.iter().filter(|c| c.size().is_none()).count() as u32;
    let left = 100u32.saturating_sub(declared);
    let share = if missing == 0 { 0 } else { left / missing };

    let mut remaining_missing = missing;
    children
        .iter()
        .map(|child| match child.size() {
            Some(size) => size,
            None => {
                remaining_missing -= 1;
                if remaining_missing == 0 {
                    left - share * (missing - 1)
                } else {
                    share
                }
            }
        })
        .collect()
}

/// A leaf created by the split pass, applied once ids are final.
struct Leaf<'l> {
    name: &'l str,
    pane: String,
    directory: Option<&'l str>,
    command: Option<&'l str>,
}

/// Applies [`Layout`] statements through a [`Tmux`].
pub struct LayoutEngine<'t, 'm> {
    tmux: &'t Tmux<'m>,
}

impl<'t, 'm> LayoutEngine<'t, 'm> {
    pub fn new(tmux: &'t Tmux<'m>) -> Self {
        Self { tmux }
    }

    /// Create (or restore) the panes of `layout` and record them in `panes`.
    ///
    /// The layout file of `title` maps every pane created so far to its id.
    /// When it already knows every name `layout` declares, the saved ids are
    /// reused and no pane is created. Otherwise the layout is built and its
    /// panes are merged into the file.
    pub fn apply(&self, layout: &Layout, title: &str, panes: &mut PaneMap) -> Result<()> {
        let file = self.tmux.layout_file(title)?;
        let mut saved = load_saved(&file)?.unwrap_or_default();
        let declared = declared_names(layout);

        if !declared.is_empty() && declared.iter().all(|name| saved.contains_key(*name)) {
            tracing::info!(file = %file.display(), panes = declared.len(), "restoring saved layout");
            for name in declared {
                if let Some(id) = saved.get(name) {
                    panes.insert(name.to_string(), id.clone());
                }
            }
            return Ok(());
        }

        let created = self.build(layout)?;
        saved.extend(created.iter().map(|(name, id)| (name.clone(), id.clone())));
        let yaml = serde_yaml::to_string(&saved)
            .map_err(|e| RunbookError::StoreError(format!("failed to serialize layout: {}", e)))?;
        atomic_write_file(&file, &yaml)?;
        tracing::info!(file = %file.display(), panes = created.len(), "layout created");
        panes.extend(created);
        Ok(())
    }

    /// Split panes and create windows; returns the name → id map.
    pub fn build(&self, layout: &Layout) -> Result<PaneMap> {
        if let Some(name) = &layout.name {
            self.tmux.rename_window(name)?;
        }

        let runbook_pane = self.tmux.runbook_pane()?;
        let mut leaves = Vec::new();
        if !layout.structure.is_empty() {
            self.split_children(&runbook_pane, &layout.structure, 0, &mut leaves)?;
        }
        for window in &layout.windows {
            let first = self.tmux.new_window(&window.name)?;
            if window.structure.is_empty() {
                continue;
            }
            self.split_children(&first, &window.structure, 0, &mut leaves)?;
        }

        self.place_runbook_pane(&runbook_pane, &mut leaves)?;

        let mut created = PaneMap::new();
        for leaf in &leaves {
            if let Some(directory) = leaf.directory {
                self.tmux.set_directory(directory, &leaf.pane)?;
            }
            if let Some(command) = leaf.command {
                self.tmux.send_keys(command, &leaf.pane)?;
            }
            created.insert(leaf.name.to_string(), leaf.pane.clone());
        }
        Ok(created)
    }

    fn split_children<'l>(
        &self,
        pane: &str,
        children: &'l [LayoutNode],
        depth: usize,
        leaves: &mut Vec<Leaf<'l>>,
    ) -> Result<()> {
        let sizes = resolve_sizes(children);
        let mut targets = vec![pane.to_string()];
        for index in 1..children.len() {
            let remaining: u32 = sizes[index..].iter().sum();
            let including: u32 = sizes[index - 1..].iter().sum();
            let percent = if including == 0 {
                50
            } else {
                (remaining * 100 / including).clamp(1, 99)
            };
            let previous = &targets[index - 1];
            let created = self.tmux.split(previous, depth, percent)?;
            targets.push(created);
        }

        for (child, target) in children.iter().zip(targets) {
            match child {
                LayoutNode::Name(name) => leaves.push(Leaf {
                    name,
                    pane: target,
                    directory: None,
                    command: None,
                }),
                LayoutNode::Pane(spec) => leaves.push(Leaf {
                    name: &spec.name,
                    pane: target,
                    directory: spec.directory.as_deref(),
                    command: spec.command.as_deref(),
                }),
                LayoutNode::Split(nested) => self.split_children(&target, nested, depth + 1, leaves)?,
                LayoutNode::Group(group) => {
                    self.split_children(&target, &group.panes, depth + 1, leaves)?
                }
            }
        }
        Ok(())
    }

    /// Move the runbook's own pane to the leaf named [`RUNBOOK_PANE`].
    fn place_runbook_pane(&self, runbook_pane: &str, leaves: &mut [Leaf<'_>]) -> Result<()> {
        let Some(slot) = leaves
            .iter()
            .find(|leaf| leaf.name == RUNBOOK_PANE)
            .map(|leaf| leaf.pane.clone())
        else {
            return Ok(());
        };
        if slot == runbook_pane {
            return Ok(());
        }

        self.tmux.swap_panes(&slot, runbook_pane)?;
        // Pane ids travel with their content.
        for leaf in leaves.iter_mut() {
            if leaf.name == RUNBOOK_PANE {
                leaf.pane = runbook_pane.to_string();
            } else if leaf.pane == runbook_pane {
                leaf.pane = slot.clone();
            }
        }
        Ok(())
    }
}

/// Pane names of `layout`, current window first.
fn declared_names(layout: &Layout) -> Vec<&str> {
    let mut names = Vec::new();
    collect_names(&layout.structure, &mut names);
    for window in &layout.windows {
        collect_names(&window.structure, &mut names);
    }
    names
}

fn collect_names<'l>(children: &'l [LayoutNode], names: &mut Vec<&'l str>) {
    for child in children {
        match child {
            LayoutNode::Name(name) => names.push(name.as_str()),
            LayoutNode::Pane(pane) => names.push(pane.name.as_str()),
            LayoutNode::Split(nested) => collect_names(nested, names),
            LayoutNode::Group(group) => collect_names(&group.panes, names),
        }
    }
}

fn load_saved(file: &Path) -> Result<Option<PaneMap>> {
    if !file.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(file).map_err(|e| {
        RunbookError::StoreError(format!("failed to read layout '{}': {}", file.display(), e))
    })?;
    serde_yaml::from_str(&content).map(Some).map_err(|e| {
        RunbookError::StoreError(format!("failed to parse layout '{}': {}", file.display(), e))
    })
}
