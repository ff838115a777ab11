//! Stream manifests.
//!
//! A manifest is an unencrypted JSON blob addressed by the descriptor's
//! SD hash. It lists the encrypted chunks of a stream in playback order.

use crate::cipher::{StreamKey, encrypt_chunk};
use crate::hash::BlobHash;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Reference to one encrypted chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Hash of the encrypted blob.
    pub blob_hash: BlobHash,
    /// Plaintext length of the chunk.
    pub length: u64,
}

/// Ordered chunk list plus the key needed to open it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamManifest {
    pub stream_name: String,
    #[serde(default)]
    pub suggested_file_name: String,
    /// Hex-encoded AES-256 key.
    pub key: String,
    /// Plaintext bytes per chunk, except possibly the last.
    pub chunk_size: u64,
    /// Total plaintext bytes.
    pub size: u64,
    pub chunks: Vec<ChunkRef>,
}

impl StreamManifest {
    /// Check the structural invariants of the chunk list.
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |msg: String| Err(crate::Error::InvalidManifest(msg));

        if self.chunks.is_empty() {
            return invalid("no chunks".to_string());
        }
        if self.chunk_size == 0 {
            return invalid("chunk_size is 0".to_string());
        }
        self.stream_key()?;

        let last = self.chunks.len() - 1;
        let mut total: u64 = 0;
        for (i, chunk) in self.chunks.iter().enumerate() {
            if i < last && chunk.length != self.chunk_size {
                return invalid(format!(
                    "chunk {i} has length {}, expected {}",
                    chunk.length, self.chunk_size
                ));
            }
            if i == last && (chunk.length == 0 || chunk.length > self.chunk_size) {
                return invalid(format!("last chunk has length {}", chunk.length));
            }
            total = total.saturating_add(chunk.length);
        }
        if total != self.size {
            return invalid(format!(
                "chunk lengths sum to {total}, manifest says {}",
                self.size
            ));
        }
        Ok(())
    }

    /// Decode the stream key.
    pub fn stream_key(&self) -> crate::Result<StreamKey> {
        StreamKey::from_hex(&self.key)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Plaintext offset at which chunk `index` starts.
    pub fn chunk_offset(&self, index: usize) -> u64 {
        index as u64 * self.chunk_size
    }

    /// Map a plaintext offset to `(chunk index, offset within that chunk)`.
    ///
    /// Returns `None` if `offset` is at or past the end of the stream.
    pub fn locate(&self, offset: u64) -> Option<(usize, u64)> {
        if offset >= self.size || self.chunk_size == 0 {
            return None;
        }
        let index = usize::try_from(offset / self.chunk_size).ok()?;
        Some((index, offset % self.chunk_size))
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(json: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(json).map_err(|e| crate::Error::InvalidManifest(e.to_string()))
    }
}

/// A stream split, encrypted and ready to be written to a blob store.
#[derive(Clone, Debug)]
pub struct PackedStream {
    pub manifest: StreamManifest,
    /// Serialized manifest.
    pub manifest_blob: Bytes,
    /// Hash of `manifest_blob`; this is the SD hash.
    pub manifest_hash: BlobHash,
    /// Encrypted chunk blobs in order.
    pub chunks: Vec<(BlobHash, Bytes)>,
}

impl PackedStream {
    /// All blobs including the manifest.
    pub fn blobs(&self) -> impl Iterator<Item = (BlobHash, Bytes)> + '_ {
        std::iter::once((self.manifest_hash, self.manifest_blob.clone()))
            .chain(self.chunks.iter().cloned())
    }
}

/// Split `plaintext` into chunks of `chunk_size`, encrypt each under a fresh
/// key and build the manifest.
pub fn pack(
    plaintext: &[u8],
    chunk_size: usize,
    stream_name: &str,
    suggested_file_name: &str,
) -> crate::Result<PackedStream> {
    if plaintext.is_empty() {
        return Err(crate::Error::InvalidManifest("empty stream".to_string()));
    }
    if chunk_size == 0 || chunk_size > crate::DEFAULT_CHUNK_SIZE {
        return Err(crate::Error::InvalidManifest(format!(
            "chunk size {chunk_size} out of range"
        )));
    }

    let key = StreamKey::generate();
    let mut chunks = Vec::new();
    let mut refs = Vec::new();
    for piece in plaintext.chunks(chunk_size) {
        let blob = encrypt_chunk(&key, piece)?;
        let hash = BlobHash::compute(&blob);
        refs.push(ChunkRef {
            blob_hash: hash,
            length: piece.len() as u64,
        });
        chunks.push((hash, blob));
    }

    let manifest = StreamManifest {
        stream_name: stream_name.to_string(),
        suggested_file_name: suggested_file_name.to_string(),
        key: key.to_hex(),
        chunk_size: chunk_size as u64,
        size: plaintext.len() as u64,
        chunks: refs,
    };
    manifest.validate()?;

    let manifest_blob = Bytes::from(manifest.to_json()?);
    let manifest_hash = BlobHash::compute(&manifest_blob);
    Ok(PackedStream {
        manifest,
        manifest_blob,
        manifest_hash,
        chunks,
    })
}
