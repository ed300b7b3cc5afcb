//! Append-only run journal.
//!
//! Every run of a book appends NDJSON events (one JSON object per line) to
//! `runbook_journal_<slug>.ndjson` in the store directory. Unlike the pose and
//! repo, the journal survives successful runs.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`run_started`, `statement_completed`, ...)
//! - `actor`: `user@HOST`
//! - `position`: statement position for statement-level events
//! - `details`: freeform object

use super::actor_string;
use crate::error::{Result, RunbookError};
use crate::position::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Actions recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalAction {
    RunStarted,
    RunResumed,
    StatementCompleted,
    StatementFailed,
    RunCompleted,
    RunCancelled,
}

impl std::fmt::Display for JournalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalAction::RunStarted => write!(f, "run_started"),
            JournalAction::RunResumed => write!(f, "run_resumed"),
            JournalAction::StatementCompleted => write!(f, "statement_completed"),
            JournalAction::StatementFailed => write!(f, "statement_failed"),
            JournalAction::RunCompleted => write!(f, "run_completed"),
            JournalAction::RunCancelled => write!(f, "run_cancelled"),
        }
    }
}

/// One journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    pub ts: DateTime<Utc>,
    pub action: JournalAction,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub details: Value,
}

impl JournalEvent {
    pub fn new(action: JournalAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor_string(),
            position: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RunbookError::StoreError(format!("failed to serialize journal event: {}", e)))
    }
}

/// Handle on one book's journal file.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, creating the file (and its directory) on first use.
    pub fn append(&self, event: &JournalEvent) -> Result<()> {
        let line = event.to_ndjson_line()?;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                RunbookError::StoreError(format!(
                    "failed to create journal directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                RunbookError::StoreError(format!(
                    "failed to open journal '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", line).map_err(|e| {
            RunbookError::StoreError(format!(
                "failed to write journal '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        file.sync_all().map_err(|e| {
            RunbookError::StoreError(format!(
                "failed to sync journal '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Read back every event; a missing file is an empty journal.
    pub fn read(&self) -> Result<Vec<JournalEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            RunbookError::StoreError(format!(
                "failed to read journal '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    RunbookError::StoreError(format!("corrupt journal line '{}': {}", line, e))
                })
            })
            .collect()
    }
}
