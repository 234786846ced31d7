//! Object storage for uploaded files
//!
//! Paths are relative keys such as `user-a/policy.txt`; the filesystem
//! store resolves them under its root and refuses keys that escape it.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Raw file storage consumed by the pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object's bytes
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Write an object, replacing any previous content
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Remove an object
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Object store backed by a local directory
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(Error::Storage(format!("Invalid storage path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        debug!("Reading object {:?}", full);
        tokio::fs::read(&full)
            .await
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", path, e)))
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!("Writing object {:?} ({} bytes)", full, bytes.len());
        tokio::fs::write(&full, bytes).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        debug!("Removing object {:?}", full);
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| Error::Storage(format!("Failed to remove {}: {}", path, e)))
    }
}
