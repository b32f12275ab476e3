//! # Runtime Configuration
//!
//! Cache and commit timing for the master and slave databases. These never
//! affect what is generated, only how long it stays in memory.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CelestialError, CelestialResult};

/// Configuration for [`crate::CelestialMasterDatabase`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Chunk cache time-to-live (ms).
    pub cache_ttl_ms: u64,
    /// Random extra lifetime added per chunk (ms).
    pub cache_jitter_ms: u64,
    /// Soft cap on resident chunks, 0 for unbounded.
    pub max_cached_chunks: usize,
    /// Minimum time between periodic commits (ms).
    pub commit_interval_ms: u64,
    /// Chunk store directory. `None` keeps everything in memory.
    pub store_dir: Option<PathBuf>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 60_000,
            cache_jitter_ms: 10_000,
            max_cached_chunks: 512,
            commit_interval_ms: 5_000,
            store_dir: None,
        }
    }
}

impl MasterConfig {
    /// Production config: long-lived cache, frequent commits.
    #[must_use]
    pub fn production() -> Self {
        Self {
            cache_ttl_ms: 300_000,
            cache_jitter_ms: 60_000,
            max_cached_chunks: 4_096,
            commit_interval_ms: 2_000,
            store_dir: Some(PathBuf::from("universe")),
        }
    }

    /// Parses a config from TOML; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on malformed TOML.
    pub fn from_toml_str(text: &str) -> CelestialResult<Self> {
        toml::from_str(text)
            .map_err(|e| CelestialError::InvalidConfig(format!("master config: {e}")))
    }

    /// Cache TTL as a duration.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Cache jitter as a duration.
    #[must_use]
    pub const fn cache_jitter(&self) -> Duration {
        Duration::from_millis(self.cache_jitter_ms)
    }

    /// Commit interval as a duration.
    #[must_use]
    pub const fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }
}

/// Configuration for [`crate::CelestialSlaveDatabase`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveConfig {
    /// How long a request may stay unanswered before it is re-sent (ms).
    pub request_timeout_ms: u64,
    /// Replica cache time-to-live (ms).
    pub cache_ttl_ms: u64,
    /// Random extra lifetime added per entry (ms).
    pub cache_jitter_ms: u64,
    /// Soft cap on cached chunks, 0 for unbounded.
    pub max_cached_chunks: usize,
    /// Soft cap on cached planet trees, 0 for unbounded.
    pub max_cached_systems: usize,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            cache_ttl_ms: 30_000,
            cache_jitter_ms: 5_000,
            max_cached_chunks: 256,
            max_cached_systems: 1_024,
        }
    }
}

impl SlaveConfig {
    /// Production config for game clients.
    #[must_use]
    pub const fn production() -> Self {
        Self {
            request_timeout_ms: 3_000,
            cache_ttl_ms: 120_000,
            cache_jitter_ms: 20_000,
            max_cached_chunks: 1_024,
            max_cached_systems: 4_096,
        }
    }

    /// Parses a config from TOML; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on malformed TOML.
    pub fn from_toml_str(text: &str) -> CelestialResult<Self> {
        toml::from_str(text)
            .map_err(|e| CelestialError::InvalidConfig(format!("slave config: {e}")))
    }

    /// Request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Cache TTL as a duration.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Cache jitter as a duration.
    #[must_use]
    pub const fn cache_jitter(&self) -> Duration {
        Duration::from_millis(self.cache_jitter_ms)
    }
}
