//! Metrics declaration and recording.
//!
//! Every `record_*` function has a no-op twin compiled when the `metrics`
//! feature is disabled, so call sites stay free of `cfg` attributes.

use std::time::Duration;

use crate::offload::TaskOutcome;
use crate::status::CacheStatus;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Lookup metrics

    /// Track number of fresh cache hits.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "revalidate_cache_hit_total",
            "Total number of fresh cache hits."
        );
        "revalidate_cache_hit_total"
    };
    /// Track number of stale cache hits.
    pub static ref CACHE_STALE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "revalidate_cache_stale_total",
            "Total number of stale cache hits served while revalidating."
        );
        "revalidate_cache_stale_total"
    };
    /// Track number of cold misses.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "revalidate_cache_miss_total",
            "Total number of cold misses."
        );
        "revalidate_cache_miss_total"
    };
    /// Track cold misses that awaited another caller's load.
    pub static ref CACHE_COALESCED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "revalidate_cache_coalesced_total",
            "Total number of cold misses served by a concurrent caller's load."
        );
        "revalidate_cache_coalesced_total"
    };

    // Loader metrics

    /// Histogram of loader invocation duration.
    pub static ref LOADER_DURATION: &'static str = {
        metrics::describe_histogram!(
            "revalidate_loader_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of loader invocations in seconds."
        );
        "revalidate_loader_duration_seconds"
    };
    /// Track number of failed loader invocations.
    pub static ref LOADER_ERRORS: &'static str = {
        metrics::describe_counter!(
            "revalidate_loader_errors_total",
            "Total number of failed loader invocations."
        );
        "revalidate_loader_errors_total"
    };

    // Refresh metrics

    /// Track refreshes skipped because the entry's latch was held.
    pub static ref REFRESH_SKIPPED: &'static str = {
        metrics::describe_counter!(
            "revalidate_refresh_skipped_total",
            "Total number of stale hits that found a refresh already in flight."
        );
        "revalidate_refresh_skipped_total"
    };

    // Offload manager metrics

    /// Track number of offload tasks spawned.
    pub static ref OFFLOAD_TASKS_SPAWNED: &'static str = {
        metrics::describe_counter!(
            "revalidate_offload_tasks_spawned_total",
            "Total number of offload tasks spawned."
        );
        "revalidate_offload_tasks_spawned_total"
    };
    /// Track number of offload tasks that ran to completion.
    pub static ref OFFLOAD_TASKS_COMPLETED: &'static str = {
        metrics::describe_counter!(
            "revalidate_offload_tasks_completed_total",
            "Total number of offload tasks that ran to completion."
        );
        "revalidate_offload_tasks_completed_total"
    };
    /// Track number of offload tasks cancelled by timeout.
    pub static ref OFFLOAD_TASKS_TIMEOUT: &'static str = {
        metrics::describe_counter!(
            "revalidate_offload_tasks_timeout_total",
            "Total number of offload tasks cancelled by timeout."
        );
        "revalidate_offload_tasks_timeout_total"
    };
    /// Track number of offload tasks aborted or panicked before finishing.
    pub static ref OFFLOAD_TASKS_ABORTED: &'static str = {
        metrics::describe_counter!(
            "revalidate_offload_tasks_aborted_total",
            "Total number of offload tasks aborted or panicked before finishing."
        );
        "revalidate_offload_tasks_aborted_total"
    };
    /// Gauge of currently active offload tasks.
    pub static ref OFFLOAD_TASKS_ACTIVE: &'static str = {
        metrics::describe_gauge!(
            "revalidate_offload_tasks_active",
            "Number of currently active offload tasks."
        );
        "revalidate_offload_tasks_active"
    };
    /// Histogram of offload task duration.
    pub static ref OFFLOAD_TASK_DURATION: &'static str = {
        metrics::describe_histogram!(
            "revalidate_offload_task_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of offload tasks in seconds."
        );
        "revalidate_offload_task_duration_seconds"
    };
}

/// Which path invoked the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPath {
    /// Synchronous load on a cold miss.
    Populate,
    /// Background load on a stale hit.
    Refresh,
}

impl LoadPath {
    /// Returns the label value for this path.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadPath::Populate => "populate",
            LoadPath::Refresh => "refresh",
        }
    }
}

/// Record the outcome of a lookup.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_lookup(cache: &str, status: CacheStatus) {
    let counter = match status {
        CacheStatus::Hit => *CACHE_HIT_COUNTER,
        CacheStatus::Stale => *CACHE_STALE_COUNTER,
        CacheStatus::Miss => *CACHE_MISS_COUNTER,
    };
    metrics::counter!(counter, "cache" => cache.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_lookup(_cache: &str, _status: CacheStatus) {}

/// Record a cold miss that was served by another caller's load.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_coalesced(cache: &str) {
    metrics::counter!(*CACHE_COALESCED_COUNTER, "cache" => cache.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_coalesced(_cache: &str) {}

/// Record a loader invocation.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_loader(cache: &str, path: LoadPath, duration: Duration, succeeded: bool) {
    metrics::histogram!(
        *LOADER_DURATION,
        "cache" => cache.to_string(),
        "path" => path.as_str()
    )
    .record(duration.as_secs_f64());
    if !succeeded {
        metrics::counter!(
            *LOADER_ERRORS,
            "cache" => cache.to_string(),
            "path" => path.as_str()
        )
        .increment(1);
    }
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_loader(_cache: &str, _path: LoadPath, _duration: Duration, _succeeded: bool) {}

/// Record a stale hit that lost the race for the refresh latch.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_refresh_skipped(cache: &str) {
    metrics::counter!(*REFRESH_SKIPPED, "cache" => cache.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_refresh_skipped(_cache: &str) {}

/// Record a spawned offload task.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_spawned(kind: &str) {
    metrics::counter!(*OFFLOAD_TASKS_SPAWNED, "kind" => kind.to_string()).increment(1);
    metrics::gauge!(*OFFLOAD_TASKS_ACTIVE, "kind" => kind.to_string()).increment(1.0);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_spawned(_kind: &str) {}

/// Record an offload task that ended with `outcome`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_finished(kind: &str, duration: Duration, outcome: TaskOutcome) {
    let counter = match outcome {
        TaskOutcome::Completed => *OFFLOAD_TASKS_COMPLETED,
        TaskOutcome::TimedOut => *OFFLOAD_TASKS_TIMEOUT,
        TaskOutcome::Aborted => *OFFLOAD_TASKS_ABORTED,
    };
    metrics::counter!(counter, "kind" => kind.to_string()).increment(1);
    metrics::gauge!(*OFFLOAD_TASKS_ACTIVE, "kind" => kind.to_string()).decrement(1.0);
    metrics::histogram!(*OFFLOAD_TASK_DURATION, "kind" => kind.to_string())
        .record(duration.as_secs_f64());
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_finished(_kind: &str, _duration: Duration, _outcome: TaskOutcome) {}
