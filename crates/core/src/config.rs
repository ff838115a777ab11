//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Value of the `X-Powered-By` header. Falls back to `PLAYER_NAME`,
    /// then the host name.
    #[serde(default)]
    pub instance_name: Option<String>,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Log at debug level.
    #[serde(default)]
    pub verbose: bool,
    /// Username for the runtime config endpoints.
    #[serde(default = "default_config_username")]
    pub config_username: String,
    /// Password for the runtime config endpoints.
    /// WARNING: Prefer SPOOL_SERVER__CONFIG_PASSWORD over storing in config.
    #[serde(default = "default_config_password")]
    pub config_password: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_config_username() -> String {
    "lbry".to_string()
}

fn default_config_password() -> String {
    "lbry".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            instance_name: None,
            metrics_enabled: default_metrics_enabled(),
            verbose: false,
            config_username: default_config_username(),
            config_password: default_config_password(),
        }
    }
}

/// Where blobs ultimately come from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OriginConfig {
    /// Read-only HTTP origin (CDN or reflector front).
    Http {
        /// Base URL; blobs are fetched from `{endpoint}/{hash}`.
        endpoint: String,
        /// Request timeout in seconds.
        #[serde(default = "default_origin_timeout_secs")]
        timeout_secs: u64,
    },
    /// Local filesystem store.
    Filesystem {
        /// Root directory for blobs.
        path: PathBuf,
    },
}

fn default_origin_timeout_secs() -> u64 {
    30
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/blobs"),
        }
    }
}

/// Local disk tier in front of the origin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskCacheConfig {
    /// Directory for cached blobs. Must be absolute.
    pub path: PathBuf,
    /// Upper bound on the tier, in bytes (default: 100 MB).
    #[serde(default = "default_disk_cache_bytes")]
    pub max_size_bytes: u64,
}

fn default_disk_cache_bytes() -> u64 {
    100 * 1024 * 1024
}

impl DiskCacheConfig {
    /// Number of blobs the tier may hold, assuming every blob is full size.
    pub fn max_blobs(&self) -> usize {
        let count = self.max_size_bytes / crate::MAX_BLOB_SIZE as u64;
        usize::try_from(count).unwrap_or(usize::MAX).max(1)
    }
}

/// Blob storage configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Origin store.
    #[serde(default)]
    pub origin: OriginConfig,
    /// Optional disk tier.
    #[serde(default)]
    pub disk_cache: Option<DiskCacheConfig>,
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if let OriginConfig::Http { endpoint, .. } = &self.origin
            && endpoint.trim().is_empty()
        {
            return Err("storage.origin.endpoint cannot be empty".to_string());
        }
        if let Some(disk) = &self.disk_cache {
            if !disk.path.is_absolute() {
                return Err(format!(
                    "storage.disk_cache.path must be absolute, got {}",
                    disk.path.display()
                ));
            }
            if disk.max_size_bytes == 0 {
                return Err("storage.disk_cache.max_size_bytes must be > 0".to_string());
            }
        }
        Ok(())
    }
}

/// Playback engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Capacity of the in-memory cache of decrypted blobs, in bytes.
    #[serde(default = "default_hot_cache_bytes")]
    pub hot_cache_bytes: u64,
    /// Warm upcoming chunks while a stream is being delivered.
    #[serde(default)]
    pub prefetch: bool,
    /// How many chunks ahead of the reader to warm.
    #[serde(default = "default_prefetch_depth")]
    pub prefetch_depth: usize,
    /// Base lifetime of a resolve cache entry.
    #[serde(default = "default_resolve_ttl_secs")]
    pub resolve_ttl_secs: u64,
    /// Width of the random window added to each entry's lifetime.
    #[serde(default = "default_resolve_jitter_secs")]
    pub resolve_jitter_secs: u64,
    /// Maximum number of resolved names kept.
    #[serde(default = "default_resolve_cache_entries")]
    pub resolve_cache_entries: usize,
}

fn default_hot_cache_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_prefetch_depth() -> usize {
    1
}

fn default_resolve_ttl_secs() -> u64 {
    300
}

fn default_resolve_jitter_secs() -> u64 {
    300
}

fn default_resolve_cache_entries() -> usize {
    10_000
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            hot_cache_bytes: default_hot_cache_bytes(),
            prefetch: false,
            prefetch_depth: default_prefetch_depth(),
            resolve_ttl_secs: default_resolve_ttl_secs(),
            resolve_jitter_secs: default_resolve_jitter_secs(),
            resolve_cache_entries: default_resolve_cache_entries(),
        }
    }
}

impl PlayerConfig {
    pub fn resolve_ttl(&self) -> Duration {
        Duration::from_secs(self.resolve_ttl_secs)
    }

    pub fn resolve_jitter(&self) -> Duration {
        Duration::from_secs(self.resolve_jitter_secs)
    }

    /// Validate player configuration.
    /// Returns warnings for odd but usable settings.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.hot_cache_bytes == 0 {
            return Err("player.hot_cache_bytes must be > 0".to_string());
        }
        if self.resolve_cache_entries == 0 {
            return Err("player.resolve_cache_entries must be > 0".to_string());
        }
        if self.hot_cache_bytes < crate::MAX_BLOB_SIZE as u64 {
            warnings.push(format!(
                "player.hot_cache_bytes={} is smaller than one blob; chunks will not be cached",
                self.hot_cache_bytes
            ));
        }
        if self.prefetch && self.prefetch_depth == 0 {
            warnings.push("player.prefetch is on but prefetch_depth is 0".to_string());
        }

        Ok(warnings)
    }
}

/// Egress throttling configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Pace stream output.
    #[serde(default = "default_throttle_enabled")]
    pub enabled: bool,
    /// Multiplier applied to `unit_bytes_per_sec`.
    #[serde(default = "default_throttle_scale")]
    pub scale: f64,
    /// Rate for a scale of 1.0.
    #[serde(default = "default_unit_bytes_per_sec")]
    pub unit_bytes_per_sec: u64,
}

fn default_throttle_enabled() -> bool {
    true
}

fn default_throttle_scale() -> f64 {
    1.5
}

fn default_unit_bytes_per_sec() -> u64 {
    1024 * 1024
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: default_throttle_enabled(),
            scale: default_throttle_scale(),
            unit_bytes_per_sec: default_unit_bytes_per_sec(),
        }
    }
}

impl ThrottleConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(format!("throttle.scale must be > 0, got {}", self.scale));
        }
        if self.unit_bytes_per_sec == 0 {
            return Err("throttle.unit_bytes_per_sec must be > 0".to_string());
        }
        Ok(())
    }
}

/// Paid content configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaidConfig {
    /// Public key used to verify access tokens. Without it, priced
    /// content cannot be served.
    #[serde(default)]
    pub public_key: Option<PublicKeyConfig>,
}

/// Public key source configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PublicKeyConfig {
    /// Key provided directly as a value.
    Value {
        /// `name:base64` or bare base64.
        key: String,
    },
    /// Key stored in a file.
    File {
        /// Path to the public key file.
        path: PathBuf,
    },
    /// Key fetched over HTTP at startup.
    Url {
        /// URL serving the key as text.
        url: String,
    },
}

/// Resolver (content index) configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_resolver_address")]
    pub address: String,
    /// Request timeout in seconds.
    #[serde(default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_resolver_address() -> String {
    "http://localhost:5279/".to_string()
}

fn default_resolver_timeout_secs() -> u64 {
    10
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            address: default_resolver_address(),
            timeout_secs: default_resolver_timeout_secs(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Playback engine configuration.
    #[serde(default)]
    pub player: PlayerConfig,
    /// Throttle configuration.
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Paid content configuration.
    #[serde(default)]
    pub paid: PaidConfig,
    /// Resolver configuration.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Throttling is off and the origin is a
    /// relative filesystem path.
    pub fn for_testing() -> Self {
        Self {
            throttle: ThrottleConfig {
                enabled: false,
                ..ThrottleConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate every section. Returns warnings for settings that are allowed
    /// but suspicious, or the first hard error.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        self.storage.validate()?;
        self.throttle.validate()?;
        let mut warnings = self.player.validate()?;

        if self.server.config_username == default_config_username()
            && self.server.config_password == default_config_password()
        {
            warnings.push(
                "server.config_password is the default; the throttle config endpoint \
                 is reachable with well-known credentials"
                    .to_string(),
            );
        }

        Ok(warnings)
    }
}
