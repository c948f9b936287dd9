//! Cached entry type with staleness metadata and the refresh latch.
//!
//! An entry has two time-based thresholds:
//!
//! - **Stale** - `computed_at + refresh_after`. The value is still served, but a
//!   background recomputation should be started.
//! - **Expired** - `expires_at = computed_at + expire_after`. The store drops
//!   the entry and the next lookup is a cold miss.
//!
//! Staleness depends on the reading cache's configuration, so it is evaluated
//! with [`CacheEntry::state`]. Expiry is fixed at construction time and
//! enforced by the [`Store`](crate::Store).
//!
//! ## Refresh latch
//!
//! Every entry carries a 0/1 latch that marks a background refresh in flight.
//! [`CacheEntry::try_begin_refresh`] flips it with a single compare-and-swap
//! and hands out a [`RefreshGuard`]; dropping the guard flips it back. Because
//! the guard is released on drop, the latch is freed whether the refresh
//! succeeds, fails, panics or is cancelled.

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Freshness of an entry relative to a refresh threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Computed less than `refresh_after` ago.
    Fresh,
    /// Computed `refresh_after` ago or earlier; serve it and refresh in background.
    Stale,
}

/// A computed value together with its timestamps and refresh latch.
///
/// Entries are immutable once created: a refresh produces a new entry which
/// replaces this one in the store. Entries are shared behind an [`Arc`] so
/// that every reader observing the entry observes the same latch.
pub struct CacheEntry<T> {
    value: T,
    computed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    refreshing: AtomicBool,
}

impl<T> CacheEntry<T> {
    /// Creates an entry computed at `computed_at` that expires `expire_after` later.
    pub fn new(value: T, computed_at: DateTime<Utc>, expire_after: Duration) -> Self {
        let expires_at = TimeDelta::from_std(expire_after)
            .ok()
            .and_then(|ttl| computed_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        CacheEntry {
            value,
            computed_at,
            expires_at,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Returns a reference to the cached value.
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns when the value was computed.
    #[inline]
    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    /// Returns when the entry expires and must no longer be served.
    #[inline]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns `true` once `now` has reached the absolute expiry.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Time left until expiry, saturating at zero.
    pub fn time_to_live(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Evaluates freshness against a refresh threshold.
    ///
    /// An entry is fresh while strictly less than `refresh_after` has elapsed
    /// since it was computed. A computation timestamp in the future (clock
    /// skew) counts as fresh.
    pub fn state(&self, refresh_after: Duration, now: DateTime<Utc>) -> EntryState {
        let threshold = TimeDelta::from_std(refresh_after).unwrap_or(TimeDelta::MAX);
        if now.signed_duration_since(self.computed_at) < threshold {
            EntryState::Fresh
        } else {
            EntryState::Stale
        }
    }

    /// Returns `true` while a refresh guard taken on this entry is alive.
    #[inline]
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Attempts to become the sole refresher of this entry.
    ///
    /// Performs an atomic 0→1 transition of the latch. Returns a guard that
    /// releases the latch on drop, or `None` if another refresh holds it.
    pub fn try_begin_refresh(self: &Arc<Self>) -> Option<RefreshGuard<T>> {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard {
                entry: Arc::clone(self),
            })
    }
}

impl<T: fmt::Debug> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("value", &self.value)
            .field("computed_at", &self.computed_at)
            .field("expires_at", &self.expires_at)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

/// Ownership of an entry's refresh latch.
///
/// The guard keeps the entry it was taken on alive and releases that entry's
/// latch when dropped. It is the *original* stale entry that gets released,
/// not the entry produced by the refresh.
#[must_use = "dropping the guard immediately releases the refresh latch"]
pub struct RefreshGuard<T> {
    entry: Arc<CacheEntry<T>>,
}

impl<T> Drop for RefreshGuard<T> {
    fn drop(&mut self) {
        self.entry.refreshing.store(false, Ordering::Release);
    }
}

impl<T> fmt::Debug for RefreshGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshGuard")
            .field("computed_at", &self.entry.computed_at)
            .finish()
    }
}
