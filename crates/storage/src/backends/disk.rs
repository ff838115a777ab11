//! Local filesystem blob store.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobSource, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use spool_core::BlobHash;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Content-addressed files under `root/ab/cd/<hash>`.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a new disk store, creating the root directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, hash: &BlobHash) -> PathBuf {
        self.root.join(hash.to_object_key())
    }
}

fn not_found_or_io(hash: &BlobHash, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(hash.to_hex())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl BlobSource for DiskStore {
    #[instrument(skip(self), fields(backend = "disk"))]
    async fn fetch(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        let data = fs::read(self.blob_path(hash))
            .await
            .map_err(|e| not_found_or_io(hash, e))?;
        Ok(Bytes::from(data))
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}

#[async_trait]
impl BlobStore for DiskStore {
    #[instrument(skip(self), fields(backend = "disk"))]
    async fn exists(&self, hash: &BlobHash) -> StorageResult<bool> {
        fs::try_exists(self.blob_path(hash))
            .await
            .map_err(StorageError::Io)
    }

    #[instrument(skip(self, data), fields(backend = "disk", size = data.len()))]
    async fn put(&self, hash: &BlobHash, data: Bytes) -> StorageResult<()> {
        hash.verify(&data)?;

        let path = self.blob_path(hash);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Unique temp name so concurrent writers of the same blob don't collide
        let temp_path = path.with_file_name(format!("{}.tmp.{}", hash.to_hex(), Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "disk"))]
    async fn delete(&self, hash: &BlobHash) -> StorageResult<()> {
        fs::remove_file(self.blob_path(hash))
            .await
            .map_err(|e| not_found_or_io(hash, e))
    }

    #[instrument(skip(self), fields(backend = "disk"))]
    async fn list(&self) -> StorageResult<Vec<BlobHash>> {
        let mut found: Vec<(SystemTime, BlobHash)> = Vec::new();

        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                // file_type() does not follow symlinks
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(entry.path());
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                // Leftover temp files and foreign files are skipped
                let name = entry.file_name();
                let Ok(hash) = BlobHash::from_hex(&name.to_string_lossy()) else {
                    continue;
                };
                let modified = entry
                    .metadata()
                    .await?
                    .modified()
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                found.push((modified, hash));
            }
        }

        found.sort();
        Ok(found.into_iter().map(|(_, hash)| hash).collect())
    }
}
