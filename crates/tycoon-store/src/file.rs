//! JSON file backend.
//!
//! Writes go to a sibling `*.tmp` file which is then renamed over the
//! target, so a crash mid-write leaves either the old record or the new
//! one, never a truncated file.

use std::path::{Path, PathBuf};

use tycoon_types::ProgressState;

use crate::error::StoreError;

/// Progress stored as a JSON document at a fixed path.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    /// Create a store for the given path. Nothing is touched on disk yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read,
    /// or [`StoreError::Serialization`] if its contents are not a record.
    pub async fn load(&self) -> Result<Option<ProgressState>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no progress record on disk");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        let state = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }

    /// Write the record atomically, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if any filesystem step fails.
    pub async fn save(&self, state: &ProgressState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
