//! Directory-backed cache and durable store.

use super::{DurableStore, LocalCache, SaveReceipt};
use crate::core::{CollectionKind, Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs as async_fs;

fn check_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Cache(format!("Invalid cache key '{}'", key)))
    }
}

// ============================================================================
// File Cache
// ============================================================================

/// One `<key>.json` file per cache entry.
///
/// Writes go through a temp file in the same directory and an atomic rename,
/// so a reader never observes a half-written entry.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::Cache(format!(
                "Failed to create cache directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Cache(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        let mut temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| StoreError::Cache(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(value.as_bytes())
            .map_err(|e| StoreError::Cache(format!("Failed to write cache entry: {}", e)))?;
        temp.persist(&path).map_err(|e| {
            StoreError::Cache(format!("Failed to persist '{}': {}", path.display(), e))
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Cache(format!(
                "Failed to remove '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}

// ============================================================================
// File Durable Store
// ============================================================================

/// The data directory served at `/data/<key>.json` and written by
/// `POST /api/save-data`.
#[derive(Debug, Clone)]
pub struct FileDurableStore {
    data_dir: PathBuf,
}

impl FileDurableStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, kind: CollectionKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    /// Writes the collection as pretty-printed JSON.
    pub async fn write(&self, kind: CollectionKind, data: &Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| StoreError::Serialization(kind, e.to_string()))?;
        atomic_write(&self.path_for(kind), &bytes).await
    }
}

#[async_trait]
impl DurableStore for FileDurableStore {
    async fn fetch(&self, kind: CollectionKind) -> Result<Option<String>> {
        let path = self.path_for(kind);
        match async_fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Durable(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    async fn save(&self, kind: CollectionKind, data: &Value) -> Result<SaveReceipt> {
        self.write(kind, data).await?;
        Ok(SaveReceipt::saved(kind))
    }
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await.map_err(|err| {
            StoreError::Durable(format!(
                "Failed to create parent directory '{}': {}",
                parent.display(),
                err
            ))
        })?;
    }

    let tmp = path.with_extension("tmp");
    async_fs::write(&tmp, bytes).await.map_err(|err| {
        StoreError::Durable(format!(
            "Failed to write temp file '{}': {}",
            tmp.display(),
            err
        ))
    })?;

    async_fs::rename(&tmp, path).await.map_err(|err| {
        StoreError::Durable(format!(
            "Failed to rename temp file '{}' -> '{}': {}",
            tmp.display(),
            path.display(),
            err
        ))
    })
}
