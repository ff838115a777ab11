//! Blob store backends.

pub mod caching;
pub mod disk;
pub mod http;
pub mod lru;
pub mod memory;
