use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::job::ArtifactKey;

/// Whether a `put` wrote bytes or found them already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    AlreadyPresent,
}

/// Write-once byte storage keyed by content address.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `key`. A key that already exists is left untouched.
    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<PutOutcome, StorageError>;

    /// Read the bytes stored under `key`, or `StorageError::NotFound`.
    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError>;
}

/// Flat directory of `{root}/{key}` files.
///
/// Each write goes to a temp file in the same directory and is then linked
/// into place without clobbering, so readers never observe a partial image
/// and concurrent writers of the same key leave exactly one file.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open the store, creating `root` if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &ArtifactKey) -> Result<PathBuf, StorageError> {
        let name = key.as_str();
        // Keys arrive from the queue as plain strings; keep them inside root.
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(|c| c == '/' || c == '\\' || c == '\0')
        {
            return Err(StorageError::InvalidKey(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<PutOutcome, StorageError> {
        let path = self.path_for(key)?;
        if tokio::fs::try_exists(&path).await? {
            return Ok(PutOutcome::AlreadyPresent);
        }

        let root = self.root.clone();
        let data = bytes.to_vec();
        tokio::task::spawn_blocking(move || write_no_clobber(&root, &path, &data))
            .await
            .map_err(|e| StorageError::Io(io::Error::other(e)))?
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

fn write_no_clobber(root: &Path, path: &Path, data: &[u8]) -> Result<PutOutcome, StorageError> {
    let mut tmp = tempfile::NamedTempFile::new_in(root)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(PutOutcome::Stored),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(PutOutcome::AlreadyPresent),
        Err(e) => Err(StorageError::Io(e.error)),
    }
}

/// In-process store for tests and single-process setups.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    objects: RwLock<HashMap<ArtifactKey, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physical writes performed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &ArtifactKey) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<PutOutcome, StorageError> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Ok(PutOutcome::AlreadyPresent);
        }
        objects.insert(key.clone(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(PutOutcome::Stored)
    }

    async fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}
