use crate::error::StateError;
use crate::models::StateMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Per-asset state as one pretty-printed JSON document on disk
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state map. A missing file is an empty map; a file that
    /// cannot be read or parsed is `StateCorrupt`.
    pub async fn load(&self) -> Result<StateMap, StateError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No state file at {}, starting fresh", self.path.display());
                return Ok(StateMap::new());
            }
            Err(e) => {
                return Err(StateError::StateCorrupt(format!(
                    "{}: unreadable: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if raw.trim().is_empty() {
            return Ok(StateMap::new());
        }

        serde_json::from_str(&raw).map_err(|e| {
            StateError::StateCorrupt(format!("{}: {}", self.path.display(), e))
        })
    }

    /// Write the full map via a temp file and rename, so a crash mid-write
    /// leaves the previous state intact.
    pub async fn save(&self, states: &StateMap) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(states)
            .map_err(|e| StateError::StateCorrupt(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Saved {} asset states to {}", states.len(), self.path.display());

        Ok(())
    }
}
