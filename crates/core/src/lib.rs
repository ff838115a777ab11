//! Core domain types and shared logic for the spool media-delivery daemon.
//!
//! This crate defines the data model used across all other crates:
//! - Blob hashes and their on-disk layout
//! - Stream manifests and chunk encryption
//! - Resolved content descriptors
//! - Configuration

pub mod cipher;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod hash;
pub mod manifest;

pub use cipher::{CHUNK_OVERHEAD, StreamKey, decrypt_chunk, encrypt_chunk};
pub use descriptor::{ContentDescriptor, Fee};
pub use error::{Error, Result};
pub use hash::BlobHash;
pub use manifest::{ChunkRef, PackedStream, StreamManifest, pack};

/// Largest blob a store will hold: 2 MiB.
pub const MAX_BLOB_SIZE: usize = 2 * 1024 * 1024;

/// Largest plaintext chunk that still fits in one blob once encrypted.
pub const DEFAULT_CHUNK_SIZE: usize = MAX_BLOB_SIZE - CHUNK_OVERHEAD;
