//! Resume store: where a run left off.
//!
//! Three files per book, keyed by the slug of its title, in the store
//! directory:
//!
//! - `runbook_pose_<slug>.json`: the last completed static statement
//! - `runbook_repo_<slug>.json`: the outline of the tree that position refers
//!   to, plus the captured variables
//! - `runbook_journal_<slug>.ndjson`: append-only event log
//!
//! Pose and repo are rewritten atomically after every completed statement and
//! removed at the start of a fresh run and after a successful one.

pub mod journal;
mod pose;
mod repo;

use crate::error::{Result, RunbookError};
use crate::fs::{atomic_write_file, remove_if_exists};
use crate::slug::slug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub use journal::{Journal, JournalAction, JournalEvent};
pub use pose::StoredPose;
pub use repo::Repo;

/// Persistence for one book title.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    dir: PathBuf,
    slug: String,
}

impl ResumeStore {
    pub fn new(dir: impl Into<PathBuf>, title: &str) -> Self {
        Self {
            dir: dir.into(),
            slug: slug(title),
        }
    }

    pub fn pose_path(&self) -> PathBuf {
        self.dir.join(format!("runbook_pose_{}.json", self.slug))
    }

    pub fn repo_path(&self) -> PathBuf {
        self.dir.join(format!("runbook_repo_{}.json", self.slug))
    }

    pub fn journal(&self) -> Journal {
        Journal::new(self.dir.join(format!("runbook_journal_{}.ndjson", self.slug)))
    }

    pub fn load_pose(&self) -> Result<Option<StoredPose>> {
        read_json(&self.pose_path())
    }

    pub fn save_pose(&self, pose: &StoredPose) -> Result<()> {
        write_json(&self.pose_path(), pose)
    }

    pub fn load_repo(&self) -> Result<Option<Repo>> {
        read_json(&self.repo_path())
    }

    pub fn save_repo(&self, repo: &Repo) -> Result<()> {
        write_json(&self.repo_path(), repo)
    }

    /// Remove pose and repo. The journal is kept.
    pub fn clear(&self) -> Result<()> {
        remove_if_exists(&self.pose_path())?;
        remove_if_exists(&self.repo_path())?;
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        RunbookError::StoreError(format!("failed to read '{}': {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map(Some).map_err(|e| {
        RunbookError::StoreError(format!(
            "failed to parse '{}': {}\nFix: remove the file to start over.",
            path.display(),
            e
        ))
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| {
            RunbookError::StoreError(format!(
                "failed to create store directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        RunbookError::StoreError(format!("failed to serialize '{}': {}", path.display(), e))
    })?;
    atomic_write_file(path, &json)
}

/// `USER@hostname` of whoever is running the book.
pub(crate) fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
