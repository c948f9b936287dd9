//! The stale-while-revalidate cache.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use revalidate_core::{CacheEntry, CacheKey, EntryState, RefreshGuard, Store};
use revalidate_moka::MokaStore;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, debug_span, trace, warn};

use crate::concurrency::{BroadcastConcurrencyManager, ConcurrencyDecision};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics::{self, LoadPath};
use crate::offload::OffloadManager;
use crate::status::CacheStatus;

struct CacheInner<T, S> {
    config: CacheConfig,
    store: S,
    /// Serializes every store mutation of this cache.
    write_lock: Mutex<()>,
    offload: OffloadManager,
    concurrency: Option<BroadcastConcurrencyManager<T>>,
}

/// Stale-while-revalidate cache with single-flight background refresh.
///
/// A lookup is served in one of three ways:
///
/// - **Fresh hit** - the entry was computed less than `refresh_after` ago and
///   is returned as is.
/// - **Stale hit** - the entry is older. It is returned immediately and, if no
///   refresh of this entry is already running, the loader is run once in the
///   background to replace it.
/// - **Cold miss** - there is no entry (never loaded, or older than
///   `expire_after`). The loader runs on the calling task and its result is
///   stored and returned.
///
/// Cloning a `Cache` is cheap; clones share the store and background tasks.
///
/// # Example
///
/// ```
/// use revalidate::Cache;
/// use std::convert::Infallible;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), revalidate::CacheError> {
/// let cache = Cache::named("greetings", Duration::from_secs(10), Duration::from_secs(2));
///
/// let value = cache
///     .get("en", || async { Ok::<_, Infallible>(String::from("hello")) })
///     .await?;
/// assert_eq!(value, "hello");
/// # Ok(())
/// # }
/// ```
pub struct Cache<T, S = MokaStore<T>> {
    inner: Arc<CacheInner<T, S>>,
}

impl<T, S> Clone for Cache<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S> fmt::Debug for Cache<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.inner.config)
            .field("offload", &self.inner.offload)
            .finish()
    }
}

impl<T> Cache<T, MokaStore<T>>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an unnamed cache backed by a fresh [`MokaStore`].
    pub fn new(expire_after: Duration, refresh_after: Duration) -> Self {
        Self::from_config(CacheConfig::new(expire_after, refresh_after))
    }

    /// Creates a cache whose keys are namespaced by `name`.
    ///
    /// `name` must not contain `#`.
    pub fn named(
        name: impl Into<smol_str::SmolStr>,
        expire_after: Duration,
        refresh_after: Duration,
    ) -> Self {
        Self::from_config(
            CacheConfig::builder()
                .name(name)
                .expire_after(expire_after)
                .refresh_after(refresh_after)
                .build(),
        )
    }

    /// Creates a cache from a configuration, backed by a fresh [`MokaStore`].
    pub fn from_config(config: CacheConfig) -> Self {
        let store = MokaStore::builder().label(config.store_label()).build();
        Self::with_store(config, store)
    }
}

impl<T, S> Cache<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Store<T> + 'static,
{
    /// Creates a cache on top of an existing store.
    ///
    /// Several caches may share one store as long as their names differ.
    pub fn with_store(config: CacheConfig, store: S) -> Self {
        if !config.refresh_reachable() {
            warn!(
                cache = config.label(),
                expire_after_ms = config.expire_after.as_millis(),
                refresh_after_ms = config.refresh_after.as_millis(),
                "refresh_after is not below expire_after; refreshes never trigger"
            );
        }
        let concurrency = config
            .coalesce_cold_misses
            .then(BroadcastConcurrencyManager::new);
        Self {
            inner: Arc::new(CacheInner {
                offload: OffloadManager::new(config.refresh_timeout),
                config,
                store,
                write_lock: Mutex::new(()),
                concurrency,
            }),
        }
    }

    /// Returns the configuration of this cache.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Returns the value for `key`, loading it with `loader` when needed.
    ///
    /// Only a cold miss waits for the loader, and only a cold miss can fail:
    /// the loader's error is returned and nothing is stored, so the next call
    /// retries. A stale hit returns the stored value and refreshes it in the
    /// background; failures of that refresh are logged and the stale value
    /// keeps being served.
    ///
    /// The loader may run concurrently with itself for different keys, and
    /// for the same key when cold misses race (unless
    /// [`coalesce_cold_misses`](CacheConfig::coalesce_cold_misses) is set).
    ///
    /// # Panics
    ///
    /// Background refreshes are spawned with [`tokio::spawn`], so a stale hit
    /// panics when the future is not polled inside a Tokio runtime (for
    /// example under `futures::executor::block_on`).
    pub async fn get<F, Fut, E>(&self, key: impl AsRef<str>, loader: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        self.get_with_status(key, loader)
            .await
            .map(|(value, _)| value)
    }

    /// Like [`get`](Self::get), also reporting how the lookup was served.
    ///
    /// # Panics
    ///
    /// Panics on a stale hit outside a Tokio runtime, like [`get`](Self::get).
    pub async fn get_with_status<F, Fut, E>(
        &self,
        key: impl AsRef<str>,
        loader: F,
    ) -> Result<(T, CacheStatus), CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        let key = self.inner.config.key(key.as_ref());
        let label = self.inner.config.label();

        let Some(entry) = self.inner.store.get(&key).await else {
            debug!(cache = label, %key, "cold miss");
            metrics::record_lookup(label, CacheStatus::Miss);
            let value = self.load_cold(key, loader).await?;
            return Ok((value, CacheStatus::Miss));
        };

        match entry.state(self.inner.config.refresh_after, Utc::now()) {
            EntryState::Fresh => {
                trace!(cache = label, %key, "fresh hit");
                metrics::record_lookup(label, CacheStatus::Hit);
                Ok((entry.value().clone(), CacheStatus::Hit))
            }
            EntryState::Stale => {
                metrics::record_lookup(label, CacheStatus::Stale);
                match entry.try_begin_refresh() {
                    Some(guard) => {
                        debug!(
                            cache = label,
                            %key,
                            computed_at = %entry.computed_at(),
                            "stale hit, refreshing"
                        );
                        self.spawn_refresh(key, guard, loader);
                    }
                    None => {
                        debug!(cache = label, %key, "stale hit, refresh already in flight");
                        metrics::record_refresh_skipped(label);
                    }
                }
                Ok((entry.value().clone(), CacheStatus::Stale))
            }
        }
    }

    /// Stores `value` under `key` without calling a loader.
    ///
    /// The entry counts as computed now.
    pub async fn inject(&self, key: impl AsRef<str>, value: T) {
        let key = self.inner.config.key(key.as_ref());
        debug!(cache = self.inner.config.label(), %key, "inject");
        self.commit(key, value).await;
    }

    /// Removes the entry for `key`. Returns `true` if a live entry was removed.
    pub async fn invalidate(&self, key: impl AsRef<str>) -> bool {
        let key = self.inner.config.key(key.as_ref());
        let _write = self.inner.write_lock.lock().await;
        self.inner.store.remove(&key).await
    }

    /// Counts the keys that currently have no entry (expired or never loaded).
    ///
    /// An empty iterator yields zero.
    pub async fn count_expired_elements<I>(&self, keys: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let lookups = keys.into_iter().map(|key| {
            let key = self.inner.config.key(key.as_ref());
            async move { self.inner.store.get(&key).await.is_none() }
        });
        futures::future::join_all(lookups)
            .await
            .into_iter()
            .filter(|missing| *missing)
            .count()
    }

    /// Number of background refreshes currently running.
    pub fn refreshes_in_flight(&self) -> usize {
        self.inner.offload.active_task_count()
    }

    /// Waits until every background refresh has finished.
    pub async fn wait_for_refreshes(&self) {
        self.inner.offload.wait_all().await;
    }

    /// Waits for background refreshes, giving up after `timeout`.
    ///
    /// Returns `true` if all refreshes finished in time.
    pub async fn wait_for_refreshes_timeout(&self, timeout: Duration) -> bool {
        self.inner.offload.wait_all_timeout(timeout).await
    }

    /// Aborts every running background refresh. Their latches are released.
    pub fn cancel_refreshes(&self) {
        self.inner.offload.cancel_all();
    }

    async fn load_cold<F, Fut, E>(&self, key: CacheKey, loader: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        let Some(concurrency) = &self.inner.concurrency else {
            return self.populate(key, loader).await;
        };

        match concurrency.check(&key) {
            ConcurrencyDecision::Proceed(permit) => {
                // A previous leader may have committed between our miss and the check.
                let result = match self.inner.store.get(&key).await {
                    Some(entry) => Ok(entry.value().clone()),
                    None => self.populate(key, loader).await,
                };
                permit.complete(result.clone());
                result
            }
            ConcurrencyDecision::Await(mut receiver) => match receiver.recv().await {
                Ok(result) => {
                    debug!(
                        cache = self.inner.config.label(),
                        %key,
                        "cold miss served by concurrent load"
                    );
                    metrics::record_coalesced(self.inner.config.label());
                    result
                }
                Err(_) => {
                    debug!(
                        cache = self.inner.config.label(),
                        %key,
                        "concurrent load abandoned, loading"
                    );
                    self.populate(key, loader).await
                }
            },
        }
    }

    async fn populate<F, Fut, E>(&self, key: CacheKey, loader: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let value = self.run_loader(LoadPath::Populate, loader).await?;
        self.commit(key, value.clone()).await;
        Ok(value)
    }

    fn spawn_refresh<F, Fut, E>(&self, key: CacheKey, guard: RefreshGuard<T>, loader: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        let cache = self.clone();
        let span = debug_span!(
            "revalidate.refresh",
            cache = self.inner.config.label(),
            key = %key
        );
        self.inner.offload.spawn(
            "refresh",
            async move {
                // Released when the task ends, however it ends.
                let _guard = guard;
                match cache.run_loader(LoadPath::Refresh, loader).await {
                    Ok(value) => {
                        cache.commit(key, value).await;
                        debug!("refresh committed");
                    }
                    Err(error) => {
                        warn!(%error, "background refresh failed, keeping stale value");
                    }
                }
            }
            .instrument(span),
        );
    }

    async fn run_loader<F, Fut, E>(&self, path: LoadPath, loader: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let start = Instant::now();
        let result = loader().await.map_err(CacheError::loader);
        metrics::record_loader(
            self.inner.config.label(),
            path,
            start.elapsed(),
            result.is_ok(),
        );
        result
    }

    /// Stores a brand-new entry for `value`, computed now.
    async fn commit(&self, key: CacheKey, value: T) {
        let entry = Arc::new(CacheEntry::new(
            value,
            Utc::now(),
            self.inner.config.expire_after,
        ));
        let _write = self.inner.write_lock.lock().await;
        self.inner.store.set(key, entry).await;
    }
}
