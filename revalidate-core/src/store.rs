//! Expiring entry store contract.
//!
//! The cache does not own its storage engine. It talks to a [`Store`], which
//! keeps whole [`CacheEntry`] objects under a [`CacheKey`] until the entry's
//! absolute expiry ([`CacheEntry::expires_at`]) passes.
//!
//! A store must guarantee:
//!
//! - **Read-your-writes** - a `get` after `set` observes the entry just written.
//! - **Exact expiry** - entries past their `expires_at` are reported as absent,
//!   even if physical eviction happens later.
//! - **Atomic entries** - a reader sees either the old or the new entry, never
//!   a mix.
//!
//! Writes are serialized by the cache itself, so a store does not need to
//! order concurrent writes to the same key. Reads must not block on writes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{CacheEntry, CacheKey, StoreLabel};

/// Storage engine holding cache entries with absolute expiry.
#[async_trait]
pub trait Store<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Returns the live entry for `key`, or `None` if absent or expired.
    async fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry<T>>>;

    /// Stores `entry` under `key`, replacing any previous entry.
    ///
    /// The entry must be dropped once [`CacheEntry::expires_at`] passes.
    async fn set(&self, key: CacheKey, entry: Arc<CacheEntry<T>>);

    /// Removes the entry for `key`. Returns `true` if a live entry was removed.
    async fn remove(&self, key: &CacheKey) -> bool;

    /// Returns the label of this store for logs and metrics.
    fn label(&self) -> StoreLabel {
        StoreLabel::new_static("store")
    }
}

#[async_trait]
impl<T, S> Store<T> for Arc<S>
where
    T: Send + Sync + 'static,
    S: Store<T> + ?Sized,
{
    async fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry<T>>> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: CacheKey, entry: Arc<CacheEntry<T>>) {
        self.as_ref().set(key, entry).await
    }

    async fn remove(&self, key: &CacheKey) -> bool {
        self.as_ref().remove(key).await
    }

    fn label(&self) -> StoreLabel {
        self.as_ref().label()
    }
}

#[async_trait]
impl<T, S> Store<T> for Box<S>
where
    T: Send + Sync + 'static,
    S: Store<T> + ?Sized,
{
    async fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry<T>>> {
        self.as_ref().get(key).await
    }

    async fn set(&self, key: CacheKey, entry: Arc<CacheEntry<T>>) {
        self.as_ref().set(key, entry).await
    }

    async fn remove(&self, key: &CacheKey) -> bool {
        self.as_ref().remove(key).await
    }

    fn label(&self) -> StoreLabel {
        self.as_ref().label()
    }
}
