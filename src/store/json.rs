use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{DocumentKind, DocumentStore};
use crate::{LensError, Result};

/// Documents stored as JSON files under a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    #[inline]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn path_for(&self, kind: DocumentKind) -> PathBuf {
        self.root.join(kind.relative_path())
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self, kind: DocumentKind) -> Result<Option<Value>> {
        let path = self.path_for(kind);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No {} document at {}", kind, path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(LensError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Unparseable {} document at {}: {}", kind, path.display(), e);
                Ok(None)
            }
        }
    }

    fn save(&self, kind: DocumentKind, document: &Value) -> Result<()> {
        let path = self.path_for(kind);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LensError::Storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let encoded = if kind.is_compact() {
            serde_json::to_vec(document)
        } else {
            serde_json::to_vec_pretty(document)
        }
        .map_err(|e| LensError::Storage(format!("Failed to encode {}: {}", kind, e)))?;

        // Readers only ever see the previous or the new document
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, encoded).map_err(|e| {
            LensError::Storage(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &path).map_err(|e| {
            LensError::Storage(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            ))
        })?;

        debug!("Saved {} document to {}", kind, path.display());
        Ok(())
    }

    fn remove(&self, kind: DocumentKind) -> Result<bool> {
        let path = self.path_for(kind);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LensError::Storage(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn stored_size(&self, kind: DocumentKind) -> Result<Option<u64>> {
        let path = self.path_for(kind);
        match fs::metadata(&path) {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LensError::Storage(format!(
                "Failed to stat {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
