//! Test doubles for the resolver, blob source and failure reporter.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use spool_core::{BlobHash, PackedStream};
use spool_player::{Claim, ClaimFee, ClaimSource, ClaimValue, PlayerError, PlayerResult, Resolver};
use spool_server::{ApiError, ErrorReporter};
use spool_storage::{BlobSource, MemoryStore, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Deterministic payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 13 % 253) as u8).collect()
}

/// Resolver answering from a table of claims.
#[derive(Default)]
pub struct MockResolver {
    claims: Mutex<HashMap<String, Claim>>,
}

impl MockResolver {
    pub fn insert(&self, uri: &str, claim: Claim) {
        self.claims.lock().unwrap().insert(uri.to_string(), claim);
    }
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve(&self, uri: &str) -> PlayerResult<HashMap<String, Claim>> {
        match self.claims.lock().unwrap().get(uri) {
            Some(claim) => Ok(HashMap::from([(uri.to_string(), claim.clone())])),
            None => Err(PlayerError::StreamNotFound),
        }
    }
}

/// Serves blobs from memory, flipping a byte in the ones marked corrupt.
pub struct TamperingSource {
    pub store: MemoryStore,
    corrupt: Mutex<HashSet<BlobHash>>,
}

impl TamperingSource {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            corrupt: Mutex::new(HashSet::new()),
        }
    }

    pub fn corrupt(&self, hash: BlobHash) {
        self.corrupt.lock().unwrap().insert(hash);
    }
}

#[async_trait]
impl BlobSource for TamperingSource {
    async fn fetch(&self, hash: &BlobHash) -> StorageResult<Bytes> {
        let data = self.store.fetch(hash).await?;
        if !self.corrupt.lock().unwrap().contains(hash) {
            return Ok(data);
        }
        let mut tampered = data.to_vec();
        if let Some(byte) = tampered.last_mut() {
            *byte ^= 0xff;
        }
        Ok(Bytes::from(tampered))
    }

    fn backend_name(&self) -> &'static str {
        "tampering"
    }
}

/// Reporter that remembers what it was told.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn codes(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .map(|(_, code)| code.clone())
            .collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, uri: &str, error: &ApiError) {
        self.reports
            .lock()
            .unwrap()
            .push((uri.to_string(), error.code().to_string()));
    }
}

/// Claim for a published stream, timestamped 2020-09-13T12:26:40Z.
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
