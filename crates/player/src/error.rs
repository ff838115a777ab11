//! Player error types.

use spool_core::BlobHash;
use spool_signer::SignerError;
use spool_storage::StorageError;
use thiserror::Error;

/// Failure to obtain a usable blob. Cloneable so one fetch result can be
/// handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("hash mismatch for blob {hash}: {detail}")]
    IntegrityMismatch { hash: String, detail: String },

    #[error("failed to decrypt blob {hash}: {reason}")]
    DecryptFailure { hash: String, reason: String },

    #[error("invalid manifest {hash}: {reason}")]
    InvalidManifest { hash: String, reason: String },

    #[error("blob source error: {0}")]
    Source(String),
}

impl BlobError {
    pub(crate) fn from_storage(hash: &BlobHash, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => BlobError::NotFound(hash.to_hex()),
            StorageError::HashMismatch { expected, actual } => BlobError::IntegrityMismatch {
                hash: hash.to_hex(),
                detail: format!("expected {expected}, got {actual}"),
            },
            other => BlobError::Source(other.to_string()),
        }
    }
}

/// Errors surfaced by the player.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("stream not found")]
    StreamNotFound,

    #[error("this content requires payment: no access token supplied")]
    PaymentRequired,

    #[error(transparent)]
    Access(#[from] SignerError),

    #[error("paid content is not available")]
    PaidUnavailable,

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("resolver error: {0}")]
    Resolver(String),

    #[error("invalid stream: {0}")]
    InvalidStream(String),

    #[error("range not satisfiable: offset {offset} beyond stream size {size}")]
    RangeNotSatisfiable { offset: u64, size: u64 },
}

/// Coarse classification used by the delivery layer and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BlobUnavailable,
    IntegrityMismatch,
    DecryptFailure,
    PaymentRequired,
    Unauthorized,
    Expired,
    RangeNotSatisfiable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::BlobUnavailable => "blob_unavailable",
            ErrorKind::IntegrityMismatch => "integrity_mismatch",
            ErrorKind::DecryptFailure => "decrypt_failure",
            ErrorKind::PaymentRequired => "payment_required",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Expired => "expired",
            ErrorKind::RangeNotSatisfiable => "range_not_satisfiable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl BlobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlobError::NotFound(_) | BlobError::Source(_) => ErrorKind::BlobUnavailable,
            BlobError::IntegrityMismatch { .. } => ErrorKind::IntegrityMismatch,
            BlobError::DecryptFailure { .. } => ErrorKind::DecryptFailure,
            BlobError::InvalidManifest { .. } => ErrorKind::Internal,
        }
    }
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::StreamNotFound => ErrorKind::NotFound,
            PlayerError::PaymentRequired => ErrorKind::PaymentRequired,
            PlayerError::Access(err) => match err {
                SignerError::Expired => ErrorKind::Expired,
                SignerError::InvalidSegments
                | SignerError::Malformed(_)
                | SignerError::BadSignature
                | SignerError::ContentMismatch { .. } => ErrorKind::Unauthorized,
                SignerError::KeyParsing(_) | SignerError::Io(_) => ErrorKind::Internal,
            },
            PlayerError::Blob(err) => err.kind(),
            PlayerError::RangeNotSatisfiable { .. } => ErrorKind::RangeNotSatisfiable,
            PlayerError::PaidUnavailable
            | PlayerError::Resolver(_)
            | PlayerError::InvalidStream(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for player operations.
pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
