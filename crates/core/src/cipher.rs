//! Chunk encryption.
//!
//! Every chunk of a stream is sealed with AES-256-GCM under the stream key.
//! The stored blob is `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use bytes::Bytes;
use std::fmt;

/// Nonce length prepended to each blob.
pub const NONCE_LEN: usize = 12;

/// Bytes added to a chunk by encryption.
pub const CHUNK_OVERHEAD: usize = NONCE_LEN + 16;

/// A 256-bit stream key.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamKey([u8; 32]);

impl StreamKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self(key.into())
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != 64 {
            return Err(crate::Error::InvalidKey(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, pair) in s.as_bytes().chunks(2).enumerate() {
            let hex_str =
                std::str::from_utf8(pair).map_err(|e| crate::Error::InvalidKey(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidKey(e.to_string()))?;
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamKey([REDACTED])")
    }
}

/// Seal a plaintext chunk into a storable blob.
pub fn encrypt_chunk(key: &StreamKey, plaintext: &[u8]) -> crate::Result<Bytes> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = key
        .cipher()
        .encrypt(&nonce, plaintext)
        .map_err(|e| crate::Error::Decrypt(format!("encryption failed: {e}")))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);
    Ok(Bytes::from(blob))
}

/// Open a blob produced by [`encrypt_chunk`].
pub fn decrypt_chunk(key: &StreamKey, blob: &[u8]) -> crate::Result<Bytes> {
    if blob.len() < CHUNK_OVERHEAD {
        return Err(crate::Error::Decrypt(format!(
            "blob too short: {} bytes",
            blob.len()
        )));
    }
    let (nonce, sealed) = blob.split_at(NONCE_LEN);
    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| crate::Error::Decrypt("authentication tag mismatch".to_string()))?;
    Ok(Bytes::from(plaintext))
}
