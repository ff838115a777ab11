//! Memoized resolution with jittered expiry.
//!
//! Each entry lives for `ttl` plus a uniform random extra in
//! `[0, jitter)`, so entries created together do not all go back to the
//! index at the same moment. There is no single-flight here: two requests
//! missing at once both resolve.

use crate::error::{PlayerError, PlayerResult};
use crate::resolver::{Resolver, descriptor_from_claim};
use dashmap::DashMap;
use rand::Rng;
use spool_core::ContentDescriptor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct CacheEntry {
    descriptor: Arc<ContentDescriptor>,
    expires_at: Instant,
}

/// URI to descriptor cache in front of a [`Resolver`].
pub struct ResolveCache {
    resolver: Arc<dyn Resolver>,
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    jitter: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolveCache {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        ttl: Duration,
        jitter: Duration,
        max_entries: usize,
    ) -> Self {
        Self {
            resolver,
            entries: DashMap::new(),
            ttl,
            jitter,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Resolve `uri`, serving an unexpired cached descriptor when there is one.
    pub async fn resolve(&self, uri: &str) -> PlayerResult<Arc<ContentDescriptor>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(uri)
            && entry.expires_at > now
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.descriptor.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let claims = self.resolver.resolve(uri).await?;
        let claim = claims.get(uri).ok_or(PlayerError::StreamNotFound)?;
        let descriptor = Arc::new(descriptor_from_claim(uri, claim)?);

        self.store(uri, descriptor.clone(), Instant::now());
        Ok(descriptor)
    }

    fn store(&self, uri: &str, descriptor: Arc<ContentDescriptor>, now: Instant) {
        if !self.entries.contains_key(uri) && self.entries.len() >= self.max_entries {
            self.entries.retain(|_, entry| entry.expires_at > now);
            if self.entries.len() >= self.max_entries {
                tracing::debug!(uri, max_entries = self.max_entries, "resolve cache full, not caching");
                return;
            }
        }
        let expires_at = self.expiry_from(now);
        self.entries.insert(
            uri.to_string(),
            CacheEntry {
                descriptor,
                expires_at,
            },
        );
    }

    /// Expiry for an entry created at `now`.
    fn expiry_from(&self, now: Instant) -> Instant {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        now + self.ttl + extra
    }

    /// When the cached entry for `uri` expires, if there is one.
    pub fn expires_at(&self, uri: &str) -> Option<Instant> {
        self.entries.get(uri).map(|entry| entry.expires_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
