//! Blackboard persistence.
//!
//! Profiling runs after classification, often in a separate process, so the
//! blackboard built during classification is written to disk keyed by lead
//! username and re-loaded later.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::blackboard::Blackboard;
use crate::error::ScoutError;

/// Save and restore per-lead blackboards.
pub trait BlackboardStore: Send + Sync {
    /// Load the blackboard for a lead; empty if none has been saved.
    fn load(&self, username: &str) -> Result<Blackboard, ScoutError>;

    fn save(&self, username: &str, board: &Blackboard) -> Result<(), ScoutError>;
}

/// File-backed store: one `blackboard.json` per lead under the cache dir.
#[derive(Debug, Clone)]
pub struct FileBlackboardStore {
    root: PathBuf,
}

impl FileBlackboardStore {
    /// `cache_dir` is the top-level cache directory; blackboards live at
    /// `{cache_dir}/system/{username}/blackboard.json`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: cache_dir.into().join("system"),
        }
    }

    fn path_for(&self, username: &str) -> PathBuf {
        self.root.join(username).join("blackboard.json")
    }
}

impl BlackboardStore for FileBlackboardStore {
    fn load(&self, username: &str) -> Result<Blackboard, ScoutError> {
        let path = self.path_for(username);
        if !path.exists() {
            debug!(username, "No saved blackboard, starting empty");
            return Ok(Blackboard::new());
        }

        let raw = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => Ok(Blackboard::from_dict(&value)),
            Err(e) => {
                warn!(username, error = %e, "Corrupted blackboard file, starting empty");
                Ok(Blackboard::new())
            }
        }
    }

    fn save(&self, username: &str, board: &Blackboard) -> Result<(), ScoutError> {
        let path = self.path_for(username);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&board.to_dict())?;
        std::fs::write(&path, body)?;
        debug!(username, path = %path.display(), "Saved blackboard");
        Ok(())
    }
}
