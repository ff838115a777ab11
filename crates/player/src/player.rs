//! The player: resolution, access checks and stream construction behind one
//! handle shared by every request.

use crate::access::AccessVerifier;
use crate::error::PlayerResult;
use crate::hot_cache::HotCache;
use crate::resolve_cache::ResolveCache;
use crate::resolver::Resolver;
use crate::stream::Stream;
use crate::throttle::{Throttle, ThrottleSettings};
use spool_core::config::{PlayerConfig, ThrottleConfig};
use spool_storage::BlobSource;
use std::sync::Arc;

pub struct Player {
    resolve_cache: ResolveCache,
    hot_cache: HotCache,
    access: AccessVerifier,
    throttle: Arc<ThrottleSettings>,
    prefetch_depth: usize,
}

impl Player {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        source: Arc<dyn BlobSource>,
        access: AccessVerifier,
        config: &PlayerConfig,
        throttle: &ThrottleConfig,
    ) -> Self {
        let prefetch_depth = if config.prefetch {
            config.prefetch_depth
        } else {
            0
        };
        Self {
            resolve_cache: ResolveCache::new(
                resolver,
                config.resolve_ttl(),
                config.resolve_jitter(),
                config.resolve_cache_entries,
            ),
            hot_cache: HotCache::new(source, config.hot_cache_bytes),
            access,
            throttle: Arc::new(ThrottleSettings::from_config(throttle)),
            prefetch_depth,
        }
    }

    /// Resolve `claim_name#claim_id` into an unprepared stream.
    pub async fn resolve_stream(&self, uri: &str) -> PlayerResult<Stream> {
        let descriptor = self.resolve_cache.resolve(uri).await?;
        tracing::debug!(uri, sd_hash = %descriptor.sd_hash, paid = descriptor.is_paid(), "resolved stream");
        Ok(Stream::new(
            descriptor,
            self.hot_cache.clone(),
            self.prefetch_depth,
        ))
    }

    /// Check `token` against the stream's price.
    pub fn verify_access(&self, stream: &Stream, token: &str) -> PlayerResult<()> {
        self.access.verify(stream.descriptor(), token)
    }

    /// Whether priced content can be served at all.
    pub fn accepts_paid(&self) -> bool {
        self.access.has_key()
    }

    /// Per-stream pacer built from the current settings.
    pub fn new_throttle(&self) -> Throttle {
        self.throttle.new_throttle()
    }

    pub fn throttle_settings(&self) -> &Arc<ThrottleSettings> {
        &self.throttle
    }

    pub fn hot_cache(&self) -> &HotCache {
        &self.hot_cache
    }

    pub fn resolve_cache(&self) -> &ResolveCache {
        &self.resolve_cache
    }

    pub fn prefetch_depth(&self) -> usize {
        self.prefetch_depth
    }
}
