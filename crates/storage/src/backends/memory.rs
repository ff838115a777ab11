//! In-memory blob store.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobSource, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use spool_core::BlobHash;
use std::collections::HashMap;
use std::sync::RwLock;

/// Blob store held entirely in memory. Insertion order is kept for `list`.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<BlobHash, Bytes>>,
    order: RwLock<Vec<BlobHash>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobSource for MemoryStore {
    async fn fetch(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        self.blobs
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(hash)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(hash.to_hex()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn exists(&self, hash: &BlobHash) -> StorageResult<bool> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(hash))
    }

    async fn put(&self, hash: &BlobHash, data: Bytes) -> StorageResult<()> {
        hash.verify(&data)?;
        let previous = self
            .blobs
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(*hash, data);
        if previous.is_none() {
            self.order
                .write()
                .unwrap_or_else(|p| p.into_inner())
                .push(*hash);
        }
        Ok(())
    }

    async fn delete(&self, hash: &BlobHash) -> StorageResult<()> {
        let removed = self
            .blobs
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(hash);
        if removed.is_none() {
            return Err(StorageError::NotFound(hash.to_hex()));
        }
        self.order
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .retain(|h| h != hash);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<BlobHash>> {
        Ok(self.order.read().unwrap_or_else(|p| p.into_inner()).clone())
    }
}
