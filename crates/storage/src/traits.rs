//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use spool_core::BlobHash;

/// Anything blobs can be fetched from by content hash.
#[async_trait]
pub trait BlobSource: Send + Sync + 'static {
    /// Fetch a blob. Returns `StorageError::NotFound` if the source does not
    /// have it.
    async fn fetch(&self, hash: &BlobHash) -> StorageResult<Bytes>;

    /// Get the name of this backend.
    ///
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;
}

/// A writable, content-addressed blob store.
#[async_trait]
pub trait BlobStore: BlobSource {
    /// Check if a blob exists.
    async fn exists(&self, hash: &BlobHash) -> StorageResult<bool>;

    /// Store a blob atomically. The data must hash to `hash`.
    async fn put(&self, hash: &BlobHash, data: Bytes) -> StorageResult<()>;

    /// Delete a blob. Deleting a missing blob is `NotFound`.
    async fn delete(&self, hash: &BlobHash) -> StorageResult<()>;

    /// List every stored blob, least recently written first where the
    /// backend can tell.
    async fn list(&self) -> StorageResult<Vec<BlobHash>>;
}
