//! Signer error types.

use thiserror::Error;

/// Key and token errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("key parsing error: {0}")]
    KeyParsing(String),

    #[error("token contains an invalid number of segments")]
    InvalidSegments,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature verification failed")]
    BadSignature,

    #[error("token is expired")]
    Expired,

    #[error("token was issued for {actual}, not {expected}")]
    ContentMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for key and token operations.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
