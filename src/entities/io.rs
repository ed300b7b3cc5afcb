//! Loading books from YAML files.

use super::Book;
use crate::error::{Result, RunbookError};
use serde_yaml::with::singleton_map_recursive;
use std::path::Path;

impl Book {
    /// Load and validate a book file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            RunbookError::UserError(format!("failed to read book '{}': {}", path.display(), e))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate a book from YAML. Unknown keys are rejected.
    ///
    /// Nodes and statements are single-key maps (`- step: {...}`) rather than
    /// YAML tags.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let book: Book = singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(yaml))
            .map_err(|e| RunbookError::ValidationError(format!("invalid book: {}", e)))?;

        book.validate()?;
        Ok(book)
    }
}
