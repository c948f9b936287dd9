//! Cache configuration.
//!
//! [`CacheConfig`] holds the two time thresholds that drive a cache plus the
//! optional behaviors layered on top of them:
//!
//! - **expire_after** - absolute lifetime of an entry in the store
//! - **refresh_after** - age after which a hit triggers a background refresh
//! - **refresh_timeout** - what to do with background refreshes that hang
//! - **coalesce_cold_misses** - share one load between concurrent cold misses
//!
//! Refreshes can only happen while an entry is still stored, so
//! `refresh_after` should be below `expire_after`. This is not enforced; a
//! cache built otherwise logs a warning and degrades to synchronous loads.
//!
//! Configurations deserialize from humantime durations:
//!
//! ```
//! use revalidate::CacheConfig;
//! use std::time::Duration;
//!
//! let config: CacheConfig = serde_json::from_str(
//!     r#"{"name": "users", "expire_after": "10s", "refresh_after": "2s"}"#,
//! )
//! .unwrap();
//! assert_eq!(config.refresh_after, Duration::from_secs(2));
//! assert!(!config.coalesce_cold_misses);
//! ```

use std::time::Duration;

use revalidate_core::label::UNNAMED_CACHE;
use revalidate_core::{CacheKey, StoreLabel};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::offload::TimeoutPolicy;

/// Configuration of a single [`Cache`](crate::Cache).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Namespace prefixed to every key (`{name}#{key}`). Must not contain `#`.
    #[serde(default)]
    pub name: Option<SmolStr>,
    /// Absolute time-to-live before the store drops an entry (e.g., "10s", "1m").
    #[serde(with = "humantime_serde")]
    pub expire_after: Duration,
    /// Age after which a hit is stale and triggers a background refresh.
    #[serde(with = "humantime_serde")]
    pub refresh_after: Duration,
    /// Timeout policy for background refreshes.
    #[serde(default)]
    pub refresh_timeout: TimeoutPolicy,
    /// Whether concurrent cold misses for one key share a single load.
    #[serde(default)]
    pub coalesce_cold_misses: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: None,
            expire_after: Duration::from_secs(60),
            refresh_after: Duration::from_secs(10),
            refresh_timeout: TimeoutPolicy::None,
            coalesce_cold_misses: false,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration from the two thresholds.
    pub fn new(expire_after: Duration, refresh_after: Duration) -> Self {
        Self {
            expire_after,
            refresh_after,
            ..Self::default()
        }
    }

    /// Creates a configuration from thresholds given in whole seconds.
    pub fn from_secs(expire_after_secs: u64, refresh_after_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(expire_after_secs),
            Duration::from_secs(refresh_after_secs),
        )
    }

    /// Create a new builder for CacheConfig.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Returns `true` if entries can turn stale before they expire.
    pub fn refresh_reachable(&self) -> bool {
        self.refresh_after < self.expire_after
    }

    /// Label used for this cache in logs and metrics.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_CACHE)
    }

    /// Label for a store owned by this cache alone.
    pub fn store_label(&self) -> StoreLabel {
        StoreLabel::for_cache(self.name.as_deref())
    }

    /// Composes the store key for a caller key.
    pub fn key(&self, key: &str) -> CacheKey {
        CacheKey::namespaced(self.name.as_deref(), key)
    }
}

/// Builder for CacheConfig.
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Set the cache name.
    pub fn name(self, name: impl Into<SmolStr>) -> Self {
        Self {
            config: CacheConfig {
                name: Some(name.into()),
                ..self.config
            },
        }
    }

    /// Set the absolute time-to-live of entries.
    pub fn expire_after(self, expire_after: Duration) -> Self {
        Self {
            config: CacheConfig {
                expire_after,
                ..self.config
            },
        }
    }

    /// Set the staleness threshold.
    pub fn refresh_after(self, refresh_after: Duration) -> Self {
        Self {
            config: CacheConfig {
                refresh_after,
                ..self.config
            },
        }
    }

    /// Set the timeout policy for background refreshes.
    pub fn refresh_timeout_policy(self, policy: TimeoutPolicy) -> Self {
        Self {
            config: CacheConfig {
                refresh_timeout: policy,
                ..self.config
            },
        }
    }

    /// Cancel background refreshes running longer than `duration`.
    pub fn refresh_timeout(self, duration: Duration) -> Self {
        self.refresh_timeout_policy(TimeoutPolicy::Cancel(duration))
    }

    /// Enable or disable cold-miss coalescing.
    pub fn coalesce_cold_misses(self, enabled: bool) -> Self {
        Self {
            config: CacheConfig {
                coalesce_cold_misses: enabled,
                ..self.config
            },
        }
    }

    /// Build the CacheConfig.
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
