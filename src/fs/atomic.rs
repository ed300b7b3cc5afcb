//! Crash-safe file replacement for resume state and saved layouts.
//!
//! Every write goes to a sibling temporary file which is synced and then
//! renamed over the target, so a reader only ever sees the previous or the new
//! complete contents. An interrupted write can leave a `.{name}.{pid}.tmp`
//! file behind but never a truncated target.

use crate::error::{Result, RunbookError};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Atomically replace `path` with `content`, creating parent directories.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)
            .map_err(|e| store_error("create directory", parent, e))?;
    }

    let temp_path = temp_path_for(path)?;
    if let Err(err) = write_synced(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    replace(&temp_path, path)
}

/// Atomically replace `path` with a UTF-8 string.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Remove `path`, treating a missing file as success.
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(store_error("remove", path, e)),
    }
}

/// The temporary sibling used while replacing `target`.
///
/// The process id keeps two concurrent runbook processes from sharing a
/// temporary file.
fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RunbookError::StoreError(format!("invalid file path '{}'", target.display())))?;

    let temp_name = format!(".{}.{}.tmp", file_name, std::process::id());
    Ok(match target.parent() {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    })
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| store_error("create", path, e))?;
    file.write_all(content)
        .map_err(|e| store_error("write", path, e))?;
    file.sync_all().map_err(|e| store_error("sync", path, e))
}

#[cfg(unix)]
fn replace(source: &Path, target: &Path) -> Result<()> {
    if let Err(e) = fs::rename(source, target) {
        let _ = fs::remove_file(source);
        return Err(store_error("replace", target, e));
    }

    // Persist the directory entry as well.
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(not(unix))]
fn replace(source: &Path, target: &Path) -> Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(_) if target.exists() => {
            // Rename does not overwrite on every platform.
            remove_if_exists(target)?;
            fs::rename(source, target).map_err(|e| {
                let _ = fs::remove_file(source);
                store_error("replace", target, e)
            })
        }
        Err(e) => {
            let _ = fs::remove_file(source);
            Err(store_error("replace", target, e))
        }
    }
}

fn store_error(action: &str, path: &Path, err: io::Error) -> RunbookError {
    RunbookError::StoreError(format!("failed to {} '{}': {}", action, path.display(), err))
}
