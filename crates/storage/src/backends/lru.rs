//! Count-bounded LRU tier over a blob store.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobSource, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use spool_core::BlobHash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Keeps at most `max_blobs` blobs in the wrapped store, deleting the least
/// recently used one when a new blob pushes it over.
pub struct LruStore {
    inner: Arc<dyn BlobStore>,
    index: Mutex<LruCache<BlobHash, ()>>,
}

impl LruStore {
    /// Wrap `inner`, seeding the recency index from what it already holds.
    /// Blobs beyond `max_blobs` are deleted, oldest first.
    pub async fn new(inner: Arc<dyn BlobStore>, max_blobs: usize) -> StorageResult<Self> {
        let capacity = NonZeroUsize::new(max_blobs)
            .ok_or_else(|| StorageError::Config("lru store needs room for one blob".to_string()))?;

        let existing = inner.list().await?;
        let mut index = LruCache::new(capacity);
        let mut evicted = Vec::new();
        for hash in existing {
            if let Some((old, ())) = index.push(hash, ())
                && old != hash
            {
                evicted.push(old);
            }
        }

        let store = Self {
            inner,
            index: Mutex::new(index),
        };
        for hash in evicted {
            store.remove_evicted(&hash).await;
        }
        tracing::info!(
            backend = store.inner.backend_name(),
            blobs = store.len(),
            capacity = max_blobs,
            "LRU blob tier ready"
        );
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.index.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn remove_evicted(&self, hash: &BlobHash) {
        match self.inner.delete(hash).await {
            Ok(()) => tracing::debug!(hash = %hash, "evicted blob from disk tier"),
            Err(e) if e.is_not_found() => {}
            Err(e) => tracing::warn!(hash = %hash, error = %e, "failed to evict blob"),
        }
    }
}

#[async_trait]
impl BlobSource for LruStore {
    async fn fetch(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        match self.inner.fetch(hash).await {
            Ok(data) => {
                self.index
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .promote(hash);
                Ok(data)
            }
            Err(e) => {
                if e.is_not_found() {
                    self.index
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .pop(hash);
                }
                Err(e)
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[async_trait]
impl BlobStore for LruStore {
    async fn exists(&self, hash: &BlobHash) -> StorageResult<bool> {
        self.inner.exists(hash).await
    }

    async fn put(&self, hash: &BlobHash, data: Bytes) -> StorageResult<()> {
        self.inner.put(hash, data).await?;
        let evicted = {
            let mut index = self.index.lock().unwrap_or_else(|p| p.into_inner());
            match index.push(*hash, ()) {
                Some((old, ())) if old != *hash => Some(old),
                _ => None,
            }
        };
        if let Some(old) = evicted {
            self.remove_evicted(&old).await;
        }
        Ok(())
    }

    async fn delete(&self, hash: &BlobHash) -> StorageResult<()> {
        self.index
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop(hash);
        self.inner.delete(hash).await
    }

    async fn list(&self) -> StorageResult<Vec<BlobHash>> {
        let index = self.index.lock().unwrap_or_else(|p| p.into_inner());
        // LruCache iterates most recent first
        Ok(index.iter().rev().map(|(hash, ())| *hash).collect())
    }
}
