//! Content delivery for spool.
//!
//! A request resolves a claim through the [`ResolveCache`], passes the
//! [`AccessVerifier`], and reads decrypted chunks through the [`HotCache`]
//! as a [`Stream`], paced by a [`Throttle`].

pub mod access;
pub mod error;
pub mod hot_cache;
pub mod player;
pub mod resolve_cache;
pub mod resolver;
pub mod stream;
pub mod throttle;

pub use access::AccessVerifier;
pub use error::{BlobError, ErrorKind, PlayerError, PlayerResult};
pub use hot_cache::{HotCache, HotCacheStats};
pub use player::Player;
pub use resolve_cache::ResolveCache;
pub use resolver::{Claim, ClaimFee, ClaimSource, ClaimValue, Resolver, SdkResolver, descriptor_from_claim};
pub use stream::{ChunkStream, Stream};
pub use throttle::{Throttle, ThrottleSettings, throttle_stream};
