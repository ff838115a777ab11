//! Origin plus local cache tier.

use crate::error::StorageResult;
use crate::traits::{BlobSource, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use spool_core::BlobHash;
use std::sync::Arc;
use tracing::instrument;

/// Reads from the cache tier first; on a miss fetches from the origin and
/// writes the blob through to the cache before returning it.
pub struct CachingStore {
    origin: Arc<dyn BlobSource>,
    cache: Arc<dyn BlobStore>,
}

impl CachingStore {
    pub fn new(origin: Arc<dyn BlobSource>, cache: Arc<dyn BlobStore>) -> Self {
        Self { origin, cache }
    }
}

#[async_trait]
impl BlobSource for CachingStore {
    #[instrument(skip(self), fields(backend = "caching"))]
    async fn fetch(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        match self.cache.fetch(hash).await {
            Ok(data) => return Ok(data),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!(
                    hash = %hash,
                    cache = self.cache.backend_name(),
                    error = %e,
                    "cache tier read failed, falling back to origin"
                );
            }
        }

        let data = self.origin.fetch(hash).await?;
        hash.verify(&data)?;

        if let Err(e) = self.cache.put(hash, data.clone()).await {
            tracing::warn!(hash = %hash, error = %e, "failed to write blob to cache tier");
        }
        Ok(data)
    }

    fn backend_name(&self) -> &'static str {
        "caching"
    }
}
