#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// The stale-while-revalidate cache.
///
/// [`Cache`] serves fresh entries directly, serves stale entries while
/// refreshing them in the background (at most one refresh per entry at a
/// time), and loads cold misses on the calling task.
pub mod cache;

/// Cold-miss coalescing.
///
/// When several callers miss the same key at once, each runs the loader.
/// [`BroadcastConcurrencyManager`](concurrency::BroadcastConcurrencyManager)
/// lets one caller load while the others wait for its result. Enabled by
/// [`CacheConfig::coalesce_cold_misses`].
pub mod concurrency;

/// Cache configuration types.
pub mod config;

/// Error types for cache operations.
///
/// Defines [`CacheError`], raised when a loader fails on a cold miss.
pub mod error;

/// Metrics collection for cache observability.
///
/// When the `metrics` feature is enabled, this module records counters
/// and histograms for:
/// - Fresh hits, stale hits and cold misses
/// - Loader latency and failures
/// - Background refresh tasks
pub mod metrics;

/// Background task offloading for stale-while-revalidate.
///
/// Stale hits hand their refresh to the
/// [`OffloadManager`](offload::OffloadManager), which tracks running
/// refreshes and applies the configured [`TimeoutPolicy`](offload::TimeoutPolicy).
pub mod offload;

mod status;

pub use cache::Cache;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::{CacheError, LoaderError};
pub use status::CacheStatus;

pub use revalidate_core::{CacheEntry, CacheKey, EntryState, RefreshGuard, Store, StoreLabel};
pub use revalidate_moka::MokaStore;

/// The `revalidate` prelude.
///
/// ```rust
/// use revalidate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Cache, CacheConfig, CacheError, CacheStatus, Store};
}
