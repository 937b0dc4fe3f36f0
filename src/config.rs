//! Configuration Module
//!
//! Construction parameters for the cache and its sweep strategy, and the
//! server configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

// == Cache Config ==
/// Construction parameters for an [`ObjectCache`](crate::cache::ObjectCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Diagnostic name
    pub name: String,
    /// Requested bucket count, rounded up to the next prime
    pub bucket_count: usize,
    /// Use the unique-key bucket (no duplicate keys)
    pub unique_keys: bool,
}

impl CacheConfig {
    pub fn new(name: impl Into<String>, bucket_count: usize) -> Self {
        Self {
            name: name.into(),
            bucket_count,
            unique_keys: false,
        }
    }

    pub fn with_unique_keys(mut self, unique_keys: bool) -> Self {
        self.unique_keys = unique_keys;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new("pincache", 251)
    }
}

// == Sweep Config ==
/// Parameters for a [`SweepEvictionStrategy`](crate::eviction::SweepEvictionStrategy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// Soft limit; sweeps only run at or above it
    pub preferred_max_size: usize,
    /// Delay between sweep firings, clamped by the policy
    pub sweep_interval: Duration,
}

impl SweepConfig {
    pub fn new(preferred_max_size: usize, sweep_interval: Duration) -> Self {
        Self {
            preferred_max_size,
            sweep_interval,
        }
    }
}

// == Eviction Mode ==
/// Which sweep policy the server installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionMode {
    Background,
    Foreground,
}

impl FromStr for EvictionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "background" => Ok(Self::Background),
            "foreground" => Ok(Self::Foreground),
            other => Err(format!("unknown eviction mode: {other}")),
        }
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Diagnostic cache name
    pub cache_name: String,
    /// Requested number of hash buckets
    pub bucket_count: usize,
    /// Soft size limit that triggers sweeps
    pub preferred_max_size: usize,
    /// Sweep interval in milliseconds
    pub sweep_interval_ms: u64,
    /// Whether cached values are unique per key
    pub unique_keys: bool,
    /// Sweep policy to install
    pub eviction_mode: EvictionMode,
    /// HTTP server port
    pub server_port: u16,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Diagnostic cache name (default: pincache)
    /// - `BUCKET_COUNT` - Requested bucket count (default: 251)
    /// - `PREFERRED_MAX_SIZE` - Soft size limit (default: 1000)
    /// - `SWEEP_INTERVAL_MS` - Sweep interval in milliseconds (default: 3000)
    /// - `UNIQUE_KEYS` - Forbid duplicate keys (default: true)
    /// - `EVICTION_MODE` - `background` or `foreground` (default: background)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_name: env::var("CACHE_NAME").unwrap_or(defaults.cache_name),
            bucket_count: env_or("BUCKET_COUNT", defaults.bucket_count),
            preferred_max_size: env_or("PREFERRED_MAX_SIZE", defaults.preferred_max_size),
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            unique_keys: env_or("UNIQUE_KEYS", defaults.unique_keys),
            eviction_mode: env_or("EVICTION_MODE", defaults.eviction_mode),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.cache_name.clone(), self.bucket_count)
            .with_unique_keys(self.unique_keys)
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig::new(
            self.preferred_max_size,
            Duration::from_millis(self.sweep_interval_ms),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_name: "pincache".to_string(),
            bucket_count: 251,
            preferred_max_size: 1000,
            sweep_interval_ms: 3000,
            unique_keys: true,
            eviction_mode: EvictionMode::Background,
            server_port: 3000,
        }
    }
}
