//! Injection, invalidation, expired-key counting and key namespacing.

mod common;

use std::time::Duration;

use common::{Loader, unreachable_loader};
use revalidate::{Cache, CacheConfig, CacheKey, CacheStatus, MokaStore, Store};

#[tokio::test]
async fn injected_value_is_served_fresh() {
    let cache: Cache<u64> = Cache::new(Duration::from_secs(10), Duration::from_secs(2));
    cache.inject("answer", 42).await;

    let (value, status) = cache
        .get_with_status("answer", unreachable_loader())
        .await
        .unwrap();
    assert_eq!(value, 42);
    assert_eq!(status, CacheStatus::Hit);
}

#[tokio::test]
async fn inject_replaces_loaded_value() {
    let cache: Cache<u64> = Cache::new(Duration::from_secs(10), Duration::from_secs(2));
    let loader = Loader::new();
    cache.get("k", loader.returning(1)).await.unwrap();

    cache.inject("k", 2).await;

    assert_eq!(cache.get("k", unreachable_loader()).await.unwrap(), 2);
}

#[tokio::test]
async fn count_expired_elements_counts_absent_keys() {
    let cache: Cache<u64> =
        Cache::new(Duration::from_millis(200), Duration::from_millis(100));
    cache.inject("a", 1).await;
    cache.inject("b", 2).await;

    assert_eq!(cache.count_expired_elements(["a", "b", "c"]).await, 1);
    assert_eq!(
        cache
            .count_expired_elements(vec!["a".to_string(), "d".to_string()])
            .await,
        1
    );
    assert_eq!(cache.count_expired_elements(Vec::<&str>::new()).await, 0);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(cache.count_expired_elements(["a", "b", "c"]).await, 3);
}

#[tokio::test]
async fn invalidate_forces_cold_miss() {
    let cache: Cache<u64> = Cache::new(Duration::from_secs(10), Duration::from_secs(2));
    cache.inject("k", 1).await;

    assert!(cache.invalidate("k").await);
    assert!(!cache.invalidate("k").await);

    let loader = Loader::new();
    let (value, status) = cache
        .get_with_status("k", loader.returning(2))
        .await
        .unwrap();
    assert_eq!(value, 2);
    assert_eq!(status, CacheStatus::Miss);
}

#[tokio::test]
async fn keys_are_stored_under_cache_name() {
    let cache: Cache<u64> = Cache::named("users", Duration::from_secs(10), Duration::from_secs(2));
    cache.inject("42", 7).await;

    let entry = cache
        .store()
        .get(&CacheKey::from("users#42"))
        .await
        .expect("entry stored under namespaced key");
    assert_eq!(*entry.value(), 7);
    assert!(cache.store().get(&CacheKey::from("42")).await.is_none());
    assert_eq!(cache.store().label().as_str(), "users");
}

#[tokio::test]
async fn named_caches_sharing_a_store_stay_apart() {
    let store = MokaStore::<u64>::builder().label("shared").build();
    let config = |name: &str| {
        CacheConfig::builder()
            .name(name)
            .expire_after(Duration::from_secs(10))
            .refresh_after(Duration::from_secs(2))
            .build()
    };
    let users = Cache::with_store(config("users"), store.clone());
    let orders = Cache::with_store(config("orders"), store.clone());
    let users_again = Cache::with_store(config("users"), store.clone());

    users.inject("1", 100).await;
    orders.inject("1", 200).await;

    assert_eq!(users.get("1", unreachable_loader()).await.unwrap(), 100);
    assert_eq!(orders.get("1", unreachable_loader()).await.unwrap(), 200);
    assert_eq!(users_again.get("1", unreachable_loader()).await.unwrap(), 100);
    assert_eq!(users.store().label().as_str(), "shared");
}

#[tokio::test]
async fn refresh_threshold_at_or_above_expiry_degrades_to_cold_misses() {
    let cache: Cache<u64> = Cache::new(Duration::from_millis(100), Duration::from_millis(100));
    let loader = Loader::new();
    cache.get("k", loader.returning(1)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    let (value, status) = cache
        .get_with_status("k", loader.returning(2))
        .await
        .unwrap();
    assert_eq!(value, 2);
    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(cache.refreshes_in_flight(), 0);
}

#[test]
fn lookups_without_refresh_run_on_any_executor() {
    futures::executor::block_on(async {
        let cache: Cache<u64> = Cache::new(Duration::from_secs(10), Duration::from_secs(2));
        let loader = Loader::new();

        let (value, status) = cache
            .get_with_status("k", loader.returning(1))
            .await
            .unwrap();
        assert_eq!((value, status), (1, CacheStatus::Miss));

        let (value, status) = cache
            .get_with_status("k", unreachable_loader())
            .await
            .unwrap();
        assert_eq!((value, status), (1, CacheStatus::Hit));
    });
}

#[test]
#[should_panic]
fn stale_hit_outside_tokio_runtime_panics() {
    futures::executor::block_on(async {
        let cache: Cache<u64> = Cache::new(Duration::from_secs(10), Duration::ZERO);
        cache.inject("k", 1).await;

        let loader = Loader::new();
        let _ = cache.get("k", loader.returning(2)).await;
    });
}
