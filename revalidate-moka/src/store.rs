//! Moka store implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use revalidate_core::{CacheEntry, CacheKey, Store, StoreLabel};
use tracing::trace;

use crate::builder::MokaStoreBuilder;

/// In-memory entry store powered by Moka.
///
/// `MokaStore` keeps [`CacheEntry`] objects behind an [`Arc`] and drops each
/// one at its own absolute expiry. It uses Moka's async cache internally,
/// which offers lock-free reads and fine-grained locking for writes.
///
/// # Examples
///
/// ```
/// use revalidate_moka::MokaStore;
///
/// let store = MokaStore::<u64>::builder().max_entries(10_000).build();
/// ```
///
/// # Caveats
///
/// - Data is **not persisted**; entries are lost on process restart
/// - Data is **not shared** across processes
/// - Physical eviction is **best-effort**, but [`Store::get`] never returns an
///   entry past its `expires_at`
pub struct MokaStore<T> {
    pub(crate) cache: Cache<CacheKey, Arc<CacheEntry<T>>>,
    pub(crate) label: StoreLabel,
}

impl<T> Clone for MokaStore<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            label: self.label.clone(),
        }
    }
}

impl<T> std::fmt::Debug for MokaStore<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("label", &self.label)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl<T> MokaStore<T>
where
    T: Send + Sync + 'static,
{
    /// Creates a new builder for `MokaStore`.
    pub fn builder() -> MokaStoreBuilder<T> {
        MokaStoreBuilder::new()
    }

    /// Approximate number of entries currently held, including expired ones
    /// not yet evicted.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs Moka's pending housekeeping (evictions, expirations).
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl<T> Default for MokaStore<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::builder().build()
    }
}

#[async_trait]
impl<T> Store<T> for MokaStore<T>
where
    T: Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry<T>>> {
        self.cache
            .get(key)
            .await
            .filter(|entry| !entry.is_expired(Utc::now()))
    }

    async fn set(&self, key: CacheKey, entry: Arc<CacheEntry<T>>) {
        trace!(store = %self.label, %key, expires_at = %entry.expires_at(), "store set");
        self.cache.insert(key, entry).await;
        crate::metrics::record_entries(self.label.as_str(), self.cache.entry_count());
    }

    async fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.cache.remove(key).await;
        crate::metrics::record_entries(self.label.as_str(), self.cache.entry_count());
        removed.is_some_and(|entry| !entry.is_expired(Utc::now()))
    }

    fn label(&self) -> StoreLabel {
        self.label.clone()
    }
}
