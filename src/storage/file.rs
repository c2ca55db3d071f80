//! File-based key-value storage with secure permissions.
//!
//! All keys live in one JSON object file, so `remove_all` is a single
//! unlink and writes go through a temp file + rename.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use super::KeyValueStore;
use crate::error::{Error, Result};

/// File permissions for the store file (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// File-based storage using a JSON object with 0600 permissions.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create storage at the specified path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::storage_io(&self.path, e.to_string())),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| Error::StorageSerialization(e.to_string()))
    }

    fn ensure_dir(&self) -> Result<()> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() || parent.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(parent).map_err(|e| Error::storage_io(parent, e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(parent, std::fs::Permissions::from_mode(DIR_MODE))
                .map_err(|e| Error::storage_io(parent, format!("chmod: {e}")))?;
        }
        Ok(())
    }

    fn write_all(&self, data: &BTreeMap<String, String>) -> Result<()> {
        self.ensure_dir()?;

        let content = serde_json::to_string_pretty(data)
            .map_err(|e| Error::StorageSerialization(e.to_string()))?;
        let temp_path = self.path.with_extension("tmp");

        // 0600 at creation time so the tokens are never world-readable.
        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(&temp_path)
                .map_err(|e| Error::storage_io(&temp_path, e.to_string()))?;
            file.write_all(content.as_bytes())
                .map_err(|e| Error::storage_io(&temp_path, e.to_string()))?;
            file.sync_all()
                .map_err(|e| Error::storage_io(&temp_path, e.to_string()))?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&temp_path, &content)
                .map_err(|e| Error::storage_io(&temp_path, e.to_string()))?;
        }

        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(Error::storage_io(&self.path, format!("rename: {e}")));
        }

        debug!(path = %self.path.display(), "Session file written");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.read_all()?;
        data.insert(key.to_string(), value.to_string());
        self.write_all(&data)
    }

    /// One read-modify-write of the file, so a crash leaves either the old
    /// map or the new one.
    #[instrument(skip_all, fields(count = entries.len()))]
    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut data = self.read_all()?;
        for (key, value) in entries {
            data.insert((*key).to_string(), (*value).to_string());
        }
        self.write_all(&data)
    }

    #[instrument(skip(self))]
    async fn remove_all(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_io(&self.path, e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
