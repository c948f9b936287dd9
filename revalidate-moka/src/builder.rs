//! Builder for configuring [`MokaStore`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use moka::Expiry;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use revalidate_core::{CacheEntry, CacheKey, StoreLabel};

use crate::store::MokaStore;

/// Expiration policy that derives the TTL from [`CacheEntry::expires_at`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Expiration;

impl<T> Expiry<CacheKey, Arc<CacheEntry<T>>> for Expiration {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        entry: &Arc<CacheEntry<T>>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.time_to_live(Utc::now()))
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        entry: &Arc<CacheEntry<T>>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // Moka's default keeps the OLD expiration on update. A refreshed entry
        // carries a later expiry, so always recompute from the new entry.
        Some(entry.time_to_live(Utc::now()))
    }
}

/// Builder for creating and configuring a [`MokaStore`].
///
/// Use [`MokaStore::builder`] to create a new builder instance.
///
/// # Capacity
///
/// The store is unbounded by default: entries leave it only by expiring or by
/// being explicitly removed. [`max_entries`](Self::max_entries) adds an upper
/// bound, evicting entries according to the [eviction policy](Self::eviction_policy).
///
/// # Example
///
/// ```
/// use revalidate_moka::{EvictionPolicy, MokaStore};
///
/// let store = MokaStore::<String>::builder()
///     .label("sessions")
///     .max_entries(50_000)
///     .eviction_policy(EvictionPolicy::lru())
///     .build();
/// ```
pub struct MokaStoreBuilder<T> {
    label: StoreLabel,
    max_entries: Option<u64>,
    eviction_policy: Option<EvictionPolicy>,
    _value: PhantomData<fn() -> T>,
}

impl<T> MokaStoreBuilder<T>
where
    T: Send + Sync + 'static,
{
    /// Creates a new unbounded builder labelled `"moka"`.
    pub fn new() -> Self {
        Self {
            label: StoreLabel::new_static("moka"),
            max_entries: None,
            eviction_policy: None,
            _value: PhantomData,
        }
    }

    /// Sets a custom label for this store.
    ///
    /// The label appears in logs and metrics.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the maximum number of entries the store can hold.
    pub fn max_entries(mut self, capacity: u64) -> Self {
        self.max_entries = Some(capacity);
        self
    }

    /// Sets the eviction policy used once [`max_entries`](Self::max_entries) is reached.
    ///
    /// # Default
    ///
    /// [`EvictionPolicy::tiny_lfu()`]
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    /// Builds the [`MokaStore`].
    pub fn build(self) -> MokaStore<T> {
        let mut builder = Cache::<CacheKey, Arc<CacheEntry<T>>>::builder()
            .name(self.label.as_str())
            .expire_after(Expiration);
        if let Some(capacity) = self.max_entries {
            builder = builder.max_capacity(capacity);
        }
        if let Some(policy) = self.eviction_policy {
            builder = builder.eviction_policy(policy);
        }

        MokaStore {
            cache: builder.build(),
            label: self.label,
        }
    }
}

impl<T> Default for MokaStoreBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
