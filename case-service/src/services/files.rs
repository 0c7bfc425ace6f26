//! Attachment storage on the local filesystem.
//!
//! Files are stored under generated names; the original name only lives in
//! the case record. Lookups go through [`FileStore::path_for`], which
//! refuses anything that is not a bare file name.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::models::Attachment;
use super::ServiceError;

#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist uploaded bytes under a fresh generated name.
    pub fn save(
        &self,
        original_name: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<Attachment, ServiceError> {
        let stored_name = Uuid::new_v4().to_string();
        let path = self.root.join(&stored_name);
        std::fs::write(&path, bytes)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("write {stored_name}: {e}")))?;

        Ok(Attachment {
            stored_name,
            original_name: original_name.to_string(),
            size: bytes.len() as u64,
            content_type,
        })
    }

    /// Resolve a stored name to its on-disk path. Rejects path traversal
    /// and names that do not exist.
    pub fn path_for(&self, stored_name: &str) -> Option<PathBuf> {
        let file_name = Path::new(stored_name).file_name()?;
        if file_name != stored_name {
            return None;
        }
        let path = self.root.join(file_name);
        path.is_file().then_some(path)
    }

    /// Delete a stored file; a file already gone counts as success (the
    /// purge sweep re-runs and must stay idempotent).
    pub fn remove(&self, stored_name: &str) -> Result<(), std::io::Error> {
        let file_name = match Path::new(stored_name).file_name() {
            Some(n) if n == stored_name => n.to_owned(),
            _ => return Ok(()),
        };
        match std::fs::remove_file(self.root.join(file_name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
