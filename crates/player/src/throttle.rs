//! Per-stream egress pacing.
//!
//! Process-wide settings live in [`ThrottleSettings`] and can change at
//! runtime. Each stream takes a [`Throttle`] snapshot when it starts and
//! paces its own writes with a governor token bucket. Cells are 1 KiB, or
//! single bytes for rates under 1 KiB/s.

use crate::error::BlobError;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use spool_core::config::ThrottleConfig;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const CELL_BYTES: u64 = 1024;

/// Live throttle switch and scale.
#[derive(Debug)]
pub struct ThrottleSettings {
    enabled: AtomicBool,
    scale_bits: AtomicU64,
    unit_bytes_per_sec: u64,
}

impl ThrottleSettings {
    pub fn new(enabled: bool, scale: f64, unit_bytes_per_sec: u64) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            scale_bits: AtomicU64::new(scale.to_bits()),
            unit_bytes_per_sec,
        }
    }

    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::new(config.enabled, config.scale, config.unit_bytes_per_sec)
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn scale(&self) -> f64 {
        f64::from_bits(self.scale_bits.load(Ordering::Relaxed))
    }

    /// Set the rate multiplier. Must be finite and positive.
    pub fn set_scale(&self, scale: f64) -> Result<(), String> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(format!("scale must be a positive number, got {scale}"));
        }
        self.scale_bits.store(scale.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Current target rate.
    pub fn bytes_per_sec(&self) -> u64 {
        (self.unit_bytes_per_sec as f64 * self.scale()).round() as u64
    }

    /// Snapshot the current settings into a fresh per-stream throttle.
    pub fn new_throttle(&self) -> Throttle {
        if self.enabled() {
            Throttle::with_rate(self.bytes_per_sec())
        } else {
            Throttle::unlimited()
        }
    }
}

/// Pacer for a single stream.
pub struct Throttle {
    limiter: Option<DefaultDirectRateLimiter>,
    cell_bytes: u64,
    burst_cells: NonZeroU32,
}

impl Throttle {
    pub fn unlimited() -> Self {
        Self {
            limiter: None,
            cell_bytes: CELL_BYTES,
            burst_cells: NonZeroU32::MIN,
        }
    }

    /// Allow `bytes_per_sec` on average with up to one second of burst.
    /// The effective rate never exceeds the requested one; a rate of zero
    /// is treated as one byte per second.
    pub fn with_rate(bytes_per_sec: u64) -> Self {
        let cell_bytes = if bytes_per_sec >= CELL_BYTES {
            CELL_BYTES
        } else {
            1
        };
        let cells = (bytes_per_sec / cell_bytes).clamp(1, u32::MAX as u64) as u32;
        let cells = NonZeroU32::new(cells).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(cells).allow_burst(cells);
        Self {
            limiter: Some(RateLimiter::direct(quota)),
            cell_bytes,
            burst_cells: cells,
        }
    }

    pub fn is_limited(&self) -> bool {
        self.limiter.is_some()
    }

    /// Largest write that can go out in one step.
    pub fn max_write(&self) -> usize {
        (self.burst_cells.get() as u64 * self.cell_bytes) as usize
    }

    /// Wait until `bytes` may be written.
    pub async fn pace(&self, bytes: usize) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        let mut cells = (bytes as u64).div_ceil(self.cell_bytes);
        while cells > 0 {
            let take = cells.min(self.burst_cells.get() as u64) as u32;
            let Some(n) = NonZeroU32::new(take) else {
                break;
            };
            // n never exceeds the burst, so capacity is always sufficient
            if limiter.until_n_ready(n).await.is_err() {
                break;
            }
            cells -= take as u64;
        }
    }
}

/// Pace a chunk stream, splitting large chunks so each write waits for at
/// most one burst.
pub fn throttle_stream(
    mut inner: BoxStream<'static, Result<Bytes, BlobError>>,
    throttle: Throttle,
) -> BoxStream<'static, Result<Bytes, BlobError>> {
    if !throttle.is_limited() {
        return inner;
    }
    let piece = throttle.max_write();
    Box::pin(async_stream::stream! {
        while let Some(item) = inner.next().await {
            match item {
                Ok(mut data) => {
                    while !data.is_empty() {
                        let part = data.split_to(piece.min(data.len()));
                        throttle.pace(part.len()).await;
                        yield Ok(part);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_settings_defaults_and_updates() {
        let settings = ThrottleSettings::from_config(&ThrottleConfig::default());
        assert!(settings.enabled());
        assert_eq!(settings.scale(), 1.5);
        assert_eq!(settings.bytes_per_sec(), 1_572_864);

        settings.set_scale(2.0).unwrap();
        assert_eq!(settings.bytes_per_sec(), 2 * 1024 * 1024);
        assert!(settings.set_scale(0.0).is_err());
        assert!(settings.set_scale(f64::NAN).is_err());

        settings.set_enabled(false);
        assert!(!settings.new_throttle().is_limited());
    }

    #[tokio::test]
    async fn test_unlimited_passes_through() {
        let throttle = Throttle::unlimited();
        let start = Instant::now();
        throttle.pace(100 * 1024 * 1024).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_rate_is_bounded() {
        // 64 KiB/s with a one second burst: 192 KiB needs about two seconds
        let settings = ThrottleSettings::new(true, 1.0, 64 * 1024);
        let throttle = settings.new_throttle();
        let chunks: Vec<Result<Bytes, BlobError>> =
            vec![Ok(Bytes::from(vec![0u8; 96 * 1024])), Ok(Bytes::from(vec![0u8; 96 * 1024]))];
        let body = throttle_stream(futures::stream::iter(chunks).boxed(), throttle);

        let start = Instant::now();
        let parts: Vec<_> = body.collect().await;
        let elapsed = start.elapsed();

        let total: usize = parts.iter().map(|p| p.as_ref().unwrap().len()).sum();
        assert_eq!(total, 192 * 1024);
        assert!(parts.iter().all(|p| p.as_ref().unwrap().len() <= 64 * 1024));
        assert!(elapsed >= Duration::from_millis(1800), "took {elapsed:?}");
        // Average never exceeds rate plus one burst
        let rate = total as f64 / elapsed.as_secs_f64();
        assert!(rate <= (64.0 * 1024.0) * 2.0, "rate {rate}");
    }

    #[tokio::test]
    async fn test_rate_is_bounded_below_one_kib() {
        // 200 B/s with a 200 byte burst: 500 bytes need about 1.5 seconds
        let settings = ThrottleSettings::new(true, 1.0, 200);
        let throttle = settings.new_throttle();
        assert_eq!(throttle.max_write(), 200);
        let chunks: Vec<Result<Bytes, BlobError>> = vec![Ok(Bytes::from(vec![0u8; 500]))];
        let body = throttle_stream(futures::stream::iter(chunks).boxed(), throttle);

        let start = Instant::now();
        let parts: Vec<_> = body.collect().await;
        let elapsed = start.elapsed();

        let total: usize = parts.iter().map(|p| p.as_ref().unwrap().len()).sum();
        assert_eq!(total, 500);
        assert!(parts.iter().all(|p| p.as_ref().unwrap().len() <= 200));
        assert!(elapsed >= Duration::from_millis(1300), "took {elapsed:?}");
    }

    #[test]
    fn test_cell_size_follows_rate() {
        assert_eq!(Throttle::with_rate(100).max_write(), 100);
        assert_eq!(Throttle::with_rate(0).max_write(), 1);
        assert_eq!(Throttle::with_rate(1500).max_write(), 1024);
        assert_eq!(Throttle::with_rate(64 * 1024).max_write(), 64 * 1024);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let throttle = Throttle::with_rate(1024 * 1024);
        let chunks: Vec<Result<Bytes, BlobError>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(BlobError::NotFound("x".to_string())),
            Ok(Bytes::from_static(b"never")),
        ];
        let parts: Vec<_> = throttle_stream(futures::stream::iter(chunks).boxed(), throttle)
            .collect()
            .await;
        assert_eq!(parts.len(), 2);
        assert!(parts[1].is_err());
    }
}
