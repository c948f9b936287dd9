//! Cold-miss coalescing.
//!
//! Background refreshes are single-flight by construction (see the entry
//! latch), but cold misses are not: every concurrent caller missing the same
//! key runs the loader. When enabled, [`BroadcastConcurrencyManager`] lets the
//! first caller load while later callers subscribe to its result.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use revalidate_core::CacheKey;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::CacheError;

type LoadResult<T> = Result<T, CacheError>;

/// Result of a concurrency check - whether to load or await an existing load.
pub enum ConcurrencyDecision<T> {
    /// Run the loader and publish its result through the permit.
    Proceed(LoadPermit<T>),
    /// Await the result of another in-flight load.
    Await(broadcast::Receiver<LoadResult<T>>),
}

/// Coalesces concurrent cold misses for the same key into one load.
pub struct BroadcastConcurrencyManager<T> {
    in_flight: Arc<DashMap<CacheKey, broadcast::Sender<LoadResult<T>>>>,
}

impl<T> BroadcastConcurrencyManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a manager with no loads in flight.
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Decides whether the caller leads the load for `key` or waits for it.
    pub fn check(&self, key: &CacheKey) -> ConcurrencyDecision<T> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => ConcurrencyDecision::Await(entry.get().subscribe()),
            Entry::Vacant(entry) => {
                let (sender, _) = broadcast::channel(1);
                entry.insert(sender.clone());
                ConcurrencyDecision::Proceed(LoadPermit {
                    key: key.clone(),
                    sender: Some(sender),
                    in_flight: Arc::clone(&self.in_flight),
                })
            }
        }
    }

    /// Number of keys with a load in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl<T> Default for BroadcastConcurrencyManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Leadership of one in-flight load.
///
/// Publish the result with [`LoadPermit::complete`]. A permit dropped without
/// completing (the leading caller was cancelled) closes the channel, and
/// waiters fall back to loading on their own.
pub struct LoadPermit<T> {
    key: CacheKey,
    sender: Option<broadcast::Sender<LoadResult<T>>>,
    in_flight: Arc<DashMap<CacheKey, broadcast::Sender<LoadResult<T>>>>,
}

impl<T> LoadPermit<T> {
    /// Publishes `result` to every waiter and ends the load.
    pub fn complete(mut self, result: LoadResult<T>) {
        if let Some(sender) = self.release() {
            // Nobody waiting is fine.
            let _ = sender.send(result);
        }
    }

    fn release(&mut self) -> Option<broadcast::Sender<LoadResult<T>>> {
        let sender = self.sender.take()?;
        self.in_flight
            .remove_if(&self.key, |_, current| current.same_channel(&sender));
        Some(sender)
    }
}

impl<T> Drop for LoadPermit<T> {
    fn drop(&mut self) {
        self.release();
    }
}
