//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid stream key: {0}")]
    InvalidKey(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
