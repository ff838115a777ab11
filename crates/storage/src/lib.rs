//! Blob sources and stores for spool.
//!
//! This crate provides:
//! - Content-addressed blob storage with atomic writes
//! - A read-only HTTP origin
//! - An LRU-bounded disk tier and a caching composition of origin and tier

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{
    caching::CachingStore, disk::DiskStore, http::HttpStore, lru::LruStore, memory::MemoryStore,
};
pub use error::{StorageError, StorageResult};
pub use traits::{BlobSource, BlobStore};

use spool_core::config::{OriginConfig, StorageConfig};
use std::sync::Arc;
use std::time::Duration;

/// Build the blob source chain from configuration: the origin, optionally
/// fronted by an LRU-bounded disk tier.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlobSource>> {
    config.validate().map_err(StorageError::Config)?;

    let origin: Arc<dyn BlobSource> = match &config.origin {
        OriginConfig::Http {
            endpoint,
            timeout_secs,
        } => Arc::new(HttpStore::new(
            endpoint,
            Duration::from_secs(*timeout_secs),
        )?),
        OriginConfig::Filesystem { path } => Arc::new(DiskStore::new(path).await?),
    };

    let Some(disk) = &config.disk_cache else {
        return Ok(origin);
    };

    let tier = Arc::new(DiskStore::new(&disk.path).await?);
    let lru = Arc::new(LruStore::new(tier, disk.max_blobs()).await?);
    Ok(Arc::new(CachingStore::new(origin, lru)))
}
