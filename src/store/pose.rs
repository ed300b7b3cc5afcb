use super::actor_string;
use crate::position::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The last static statement a run completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPose {
    pub title: String,
    pub position: Position,
    pub saved_at: DateTime<Utc>,
    /// `user@HOST` that completed it.
    pub actor: String,
}

impl StoredPose {
    pub fn new(title: impl Into<String>, position: Position) -> Self {
        Self {
            title: title.into(),
            position,
            saved_at: Utc::now(),
            actor: actor_string(),
        }
    }
}
