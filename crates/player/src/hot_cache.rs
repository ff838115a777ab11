//! In-memory cache of decrypted blobs.
//!
//! Entries are bounded by the total size of their payloads and evicted in
//! LRU order. Concurrent misses on the same hash share one fetch: the first
//! caller registers a shared future under the in-flight map lock and every
//! later caller awaits a clone of it. The fetch itself runs on its own task,
//! so a caller going away does not cancel it.
//!
//! A fetch is only shared, and a cached entry only reused, when the caller
//! wants the same decoding (manifest, or chunk with the same key and
//! length). A caller that disagrees decodes the blob on its own.
//!
//! Lock order is `in_flight` then `entries`.

use crate::error::BlobError;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lru::LruCache;
use spool_core::{BlobHash, StreamKey, StreamManifest, decrypt_chunk};
use spool_storage::BlobSource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type SharedFetch = Shared<BoxFuture<'static, Result<CachedBlob, BlobError>>>;

/// A decoded blob.
#[derive(Clone, Debug)]
enum CachedBlob {
    Chunk(Bytes),
    Manifest(Arc<StreamManifest>),
}

/// How to turn raw blob bytes into a cache entry.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Decode {
    Chunk { key: StreamKey, expected_len: u64 },
    Manifest,
}

impl Decode {
    /// Whether a cached value can answer this request.
    fn accepts(&self, value: &CachedBlob) -> bool {
        match (self, value) {
            (Decode::Manifest, CachedBlob::Manifest(_)) => true,
            (Decode::Chunk { expected_len, .. }, CachedBlob::Chunk(data)) => {
                data.len() as u64 == *expected_len
            }
            _ => false,
        }
    }
}

struct InFlight {
    decode: Decode,
    fetch: SharedFetch,
}

struct Entry {
    value: CachedBlob,
    size: u64,
}

struct Entries {
    lru: LruCache<BlobHash, Entry>,
    bytes: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    deduplicated: AtomicU64,
    evictions: AtomicU64,
}

struct Inner {
    source: Arc<dyn BlobSource>,
    capacity: u64,
    entries: Mutex<Entries>,
    in_flight: Mutex<HashMap<BlobHash, InFlight>>,
    counters: Counters,
}

/// Point-in-time cache statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HotCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Requests that joined a fetch already in flight.
    pub deduplicated: u64,
    pub evictions: u64,
    pub bytes: u64,
    pub entries: usize,
    pub capacity: u64,
}

/// Shared handle to the hot cache.
#[derive(Clone)]
pub struct HotCache {
    inner: Arc<Inner>,
}

/// Removes the in-flight registration when the fetch task ends, however it ends.
struct InFlightGuard {
    inner: Arc<Inner>,
    hash: BlobHash,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.hash);
    }
}

enum Lookup {
    Ready(CachedBlob),
    Pending(SharedFetch),
    /// Cached or in flight under a different decoding.
    Conflict(Decode),
}

impl HotCache {
    /// Create a cache holding at most `capacity` bytes of decoded payload.
    pub fn new(source: Arc<dyn BlobSource>, capacity: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                capacity,
                entries: Mutex::new(Entries {
                    lru: LruCache::unbounded(),
                    bytes: 0,
                }),
                in_flight: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Get a decrypted chunk.
    pub async fn get_chunk(
        &self,
        hash: &BlobHash,
        key: &StreamKey,
        expected_len: u64,
    ) -> Result<Bytes, BlobError> {
        let decode = Decode::Chunk {
            key: key.clone(),
            expected_len,
        };
        match self.get(*hash, decode).await? {
            CachedBlob::Chunk(data) => Ok(data),
            CachedBlob::Manifest(_) => Err(BlobError::Source(format!(
                "blob {hash} decoded as a manifest"
            ))),
        }
    }

    /// Get a parsed and validated stream manifest.
    pub async fn get_manifest(&self, hash: &BlobHash) -> Result<Arc<StreamManifest>, BlobError> {
        match self.get(*hash, Decode::Manifest).await? {
            CachedBlob::Manifest(manifest) => Ok(manifest),
            CachedBlob::Chunk(_) => Err(BlobError::InvalidManifest {
                hash: hash.to_hex(),
                reason: "blob decoded as a chunk".to_string(),
            }),
        }
    }

    /// Start fetching a chunk in the background unless it is cached or
    /// already being fetched. Does not wait.
    pub fn prefetch_chunk(&self, hash: &BlobHash, key: &StreamKey, expected_len: u64) {
        if self.inner.peek(hash) {
            return;
        }
        let decode = Decode::Chunk {
            key: key.clone(),
            expected_len,
        };
        // Dropping the handle leaves the fetch task running
        let _ = self.begin(*hash, decode);
    }

    /// Whether a decoded entry for `hash` is cached.
    pub fn contains(&self, hash: &BlobHash) -> bool {
        self.inner.peek(hash)
    }

    pub fn stats(&self) -> HotCacheStats {
        let c = &self.inner.counters;
        let entries = self.inner.lock_entries();
        HotCacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            deduplicated: c.deduplicated.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            bytes: entries.bytes,
            entries: entries.lru.len(),
            capacity: self.inner.capacity,
        }
    }

    async fn get(&self, hash: BlobHash, decode: Decode) -> Result<CachedBlob, BlobError> {
        match self.begin(hash, decode) {
            Lookup::Ready(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await,
            Lookup::Conflict(decode) => self.inner.fetch_decoded(&hash, decode).await,
        }
    }

    fn begin(&self, hash: BlobHash, decode: Decode) -> Lookup {
        let counters = &self.inner.counters;
        if let Some(lookup) = self.cached(&hash, &decode) {
            return lookup;
        }

        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner());

        // A fetch may have completed between the first lookup and taking the lock
        if let Some(lookup) = self.cached(&hash, &decode) {
            return lookup;
        }

        if let Some(pending) = in_flight.get(&hash) {
            if pending.decode != decode {
                counters.misses.fetch_add(1, Ordering::Relaxed);
                return Lookup::Conflict(decode);
            }
            counters.deduplicated.fetch_add(1, Ordering::Relaxed);
            return Lookup::Pending(pending.fetch.clone());
        }

        counters.misses.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let registered = decode.clone();
        let task = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: inner.clone(),
                hash,
            };
            let result = inner.fetch_decoded(&hash, decode).await;
            match &result {
                Ok(value) => inner.insert(hash, value.clone()),
                Err(e) => tracing::debug!(hash = %hash, error = %e, "blob fetch failed"),
            }
            result
        });

        let fetch = async move {
            task.await
                .unwrap_or_else(|e| Err(BlobError::Source(format!("fetch task failed: {e}"))))
        }
        .boxed()
        .shared();
        in_flight.insert(
            hash,
            InFlight {
                decode: registered,
                fetch: fetch.clone(),
            },
        );
        Lookup::Pending(fetch)
    }

    fn cached(&self, hash: &BlobHash, decode: &Decode) -> Option<Lookup> {
        let value = self.inner.touch(hash)?;
        let counters = &self.inner.counters;
        if decode.accepts(&value) {
            counters.hits.fetch_add(1, Ordering::Relaxed);
            Some(Lookup::Ready(value))
        } else {
            counters.misses.fetch_add(1, Ordering::Relaxed);
            Some(Lookup::Conflict(decode.clone()))
        }
    }
}

impl Inner {
    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn touch(&self, hash: &BlobHash) -> Option<CachedBlob> {
        self.lock_entries()
            .lru
            .get(hash)
            .map(|entry| entry.value.clone())
    }

    fn peek(&self, hash: &BlobHash) -> bool {
        let cached = self.lock_entries().lru.contains(hash);
        cached
            || self
                .in_flight
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .contains_key(hash)
    }

    async fn fetch_decoded(&self, hash: &BlobHash, decode: Decode) -> Result<CachedBlob, BlobError> {
        let raw = self
            .source
            .fetch(hash)
            .await
            .map_err(|e| BlobError::from_storage(hash, e))?;

        let actual = BlobHash::compute(&raw);
        if actual != *hash {
            return Err(BlobError::IntegrityMismatch {
                hash: hash.to_hex(),
                detail: format!("hash in response is {actual}"),
            });
        }

        match decode {
            Decode::Manifest => {
                let invalid = |reason: String| BlobError::InvalidManifest {
                    hash: hash.to_hex(),
                    reason,
                };
                let manifest =
                    StreamManifest::from_json(&raw).map_err(|e| invalid(e.to_string()))?;
                manifest.validate().map_err(|e| invalid(e.to_string()))?;
                Ok(CachedBlob::Manifest(Arc::new(manifest)))
            }
            Decode::Chunk { key, expected_len } => {
                let plain = decrypt_chunk(&key, &raw).map_err(|e| BlobError::DecryptFailure {
                    hash: hash.to_hex(),
                    reason: e.to_string(),
                })?;
                if plain.len() as u64 != expected_len {
                    return Err(BlobError::DecryptFailure {
                        hash: hash.to_hex(),
                        reason: format!(
                            "decrypted {} bytes, manifest says {expected_len}",
                            plain.len()
                        ),
                    });
                }
                Ok(CachedBlob::Chunk(plain))
            }
        }
    }

    fn insert(&self, hash: BlobHash, value: CachedBlob) {
        let size = match &value {
            CachedBlob::Chunk(data) => data.len() as u64,
            CachedBlob::Manifest(manifest) => manifest_weight(manifest),
        };
        if size > self.capacity {
            tracing::debug!(hash = %hash, size, capacity = self.capacity, "blob larger than hot cache, not caching");
            return;
        }

        let mut entries = self.lock_entries();
        if let Some(old) = entries.lru.pop(&hash) {
            entries.bytes -= old.size;
        }
        while entries.bytes + size > self.capacity {
            let Some((_, evicted)) = entries.lru.pop_lru() else {
                break;
            };
            entries.bytes -= evicted.size;
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.bytes += size;
        entries.lru.put(hash, Entry { value, size });
    }
}

/// Rough in-memory footprint of a parsed manifest.
fn manifest_weight(manifest: &StreamManifest) -> u64 {
    let fixed = 128 + manifest.stream_name.len() + manifest.suggested_file_name.len();
    (fixed + manifest.chunks.len() * std::mem::size_of::<spool_core::ChunkRef>()) as u64
}
