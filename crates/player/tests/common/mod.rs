//! Shared fixtures for player integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use spool_core::{BlobHash, PackedStream, pack};
use spool_player::{Claim, ClaimFee, ClaimSource, ClaimValue, PlayerError, PlayerResult, Resolver};
use spool_storage::{BlobSource, BlobStore, MemoryStore, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolver answering from a fixed table of claims.
#[derive(Default)]
pub struct StaticResolver {
    claims: Mutex<HashMap<String, Claim>>,
    pub calls: AtomicUsize,
}

impl StaticResolver {
    pub fn insert(&self, uri: &str, claim: Claim) {
        self.claims
            .lock()
            .unwrap()
            .insert(uri.to_string(), claim);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, uri: &str) -> PlayerResult<HashMap<String, Claim>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let claims = self.claims.lock().unwrap();
        match claims.get(uri) {
            Some(claim) => Ok(HashMap::from([(uri.to_string(), claim.clone())])),
            None => Err(PlayerError::StreamNotFound),
        }
    }
}

/// Source that counts fetches per blob.
pub struct CountingSource {
    inner: MemoryStore,
    fetches: Mutex<HashMap<BlobHash, usize>>,
}

impl CountingSource {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fetches: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetches(&self, hash: &BlobHash) -> usize {
        self.fetches.lock().unwrap().get(hash).copied().unwrap_or(0)
    }
}

#[async_trait]
impl BlobSource for CountingSource {
    async fn fetch(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        *self.fetches.lock().unwrap().entry(*hash).or_default() += 1;
        // Widen the window in which concurrent readers overlap
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.inner.fetch(hash).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Pack `data` and put every blob into `store`.
pub async fn publish(store: &MemoryStore, data: &[u8], chunk_size: usize) -> PackedStream {
    let packed = pack(data, chunk_size, "clip", "").unwrap();
    for (hash, blob) in packed.blobs() {
        store.put(&hash, blob).await.unwrap();
    }
    packed
}

/// A claim for a published stream.
pub fn claim_for(packed: &PackedStream, name: &str, claim_id: &str, fee: Option<f64>) -> Claim {
    Claim {
        canonical_url: format!("lbry://{name}#{claim_id}"),
        claim_id: claim_id.to_string(),
        name: name.to_string(),
        timestamp: Some(1_600_000_000),
        value: ClaimValue {
            source: Some(ClaimSource {
                sd_hash: packed.manifest_hash.to_hex(),
                media_type: Some("video/mp4".to_string()),
                size: Some(packed.manifest.size),
                name: None,
            }),
            fee: fee.map(|amount| ClaimFee {
                amount,
                currency: "LBC".to_string(),
                address: String::new(),
            }),
            release_time: None,
        },
    }
}
