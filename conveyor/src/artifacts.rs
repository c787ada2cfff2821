//! Artifact storage.
//!
//! Artifacts are the files stages consume and produce, addressed by
//! `(item_id, name)`. The filesystem store lays them out one directory per
//! item; the in-memory store backs tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::PipelineError;

/// Storage for stage input/output artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Reads an artifact, returning `None` if it does not exist.
    async fn read(&self, item_id: Uuid, name: &str) -> Result<Option<Vec<u8>>, PipelineError>;

    /// Writes an artifact and returns its addressable path.
    async fn write(
        &self,
        item_id: Uuid,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, PipelineError>;

    /// Returns true if the artifact exists.
    async fn exists(&self, item_id: Uuid, name: &str) -> Result<bool, PipelineError>;

    /// Returns the addressable path for an artifact without touching storage.
    fn path(&self, item_id: Uuid, name: &str) -> String;
}

/// Filesystem-backed artifact store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_path(&self, item_id: Uuid, name: &str) -> PathBuf {
        self.root.join(item_id.to_string()).join(name)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn read(&self, item_id: Uuid, name: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        let path = self.file_path(item_id, name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(
        &self,
        item_id: Uuid,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, PipelineError> {
        let path = self.file_path(item_id, name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().into_owned())
    }

    async fn exists(&self, item_id: Uuid, name: &str) -> Result<bool, PipelineError> {
        Ok(tokio::fs::try_exists(self.file_path(item_id, name)).await?)
    }

    fn path(&self, item_id: Uuid, name: &str) -> String {
        self.file_path(item_id, name).to_string_lossy().into_owned()
    }
}

/// In-memory artifact store for tests.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    files: Mutex<HashMap<(Uuid, String), Vec<u8>>>,
}

impl InMemoryArtifactStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn read(&self, item_id: Uuid, name: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        Ok(self.files.lock().get(&(item_id, name.to_string())).cloned())
    }

    async fn write(
        &self,
        item_id: Uuid,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, PipelineError> {
        self.files
            .lock()
            .insert((item_id, name.to_string()), bytes.to_vec());
        Ok(self.path(item_id, name))
    }

    async fn exists(&self, item_id: Uuid, name: &str) -> Result<bool, PipelineError> {
        Ok(self.files.lock().contains_key(&(item_id, name.to_string())))
    }

    fn path(&self, item_id: Uuid, name: &str) -> String {
        Path::new("mem")
            .join(item_id.to_string())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }
}
