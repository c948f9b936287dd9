//! Stale-while-revalidate behavior: freshness, background refresh, single-flight
//! and latch release on every refresh outcome.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Loader, unreachable_loader};
use revalidate::{Cache, CacheConfig, CacheStatus};
use tokio::sync::Barrier;
use tokio::time::sleep;

const REFRESH_AFTER: Duration = Duration::from_millis(200);
const PAST_REFRESH: Duration = Duration::from_millis(300);

fn cache() -> Cache<String> {
    Cache::named("swr", Duration::from_secs(10), REFRESH_AFTER)
}

async fn wait_for_refreshes(cache: &Cache<String>) {
    assert!(
        cache
            .wait_for_refreshes_timeout(Duration::from_secs(5))
            .await,
        "background refreshes did not finish"
    );
}

#[tokio::test]
async fn fresh_hits_do_not_invoke_loader() {
    let cache = cache();
    let loader = Loader::new();
    cache
        .get("k", loader.returning("v1".to_string()))
        .await
        .unwrap();

    for _ in 0..10 {
        let (value, status) = cache
            .get_with_status("k", loader.returning("v2".to_string()))
            .await
            .unwrap();
        assert_eq!(value, "v1");
        assert_eq!(status, CacheStatus::Hit);
    }
    assert_eq!(loader.calls(), 1);
    assert_eq!(cache.refreshes_in_flight(), 0);
}

#[tokio::test]
async fn stale_hit_serves_old_value_then_refreshes() {
    let cache = cache();
    let loader = Loader::new();
    let value = cache
        .get("k", loader.returning("v1".to_string()))
        .await
        .unwrap();
    assert_eq!(value, "v1");

    sleep(PAST_REFRESH).await;

    let (value, status) = cache
        .get_with_status("k", loader.returning("v2".to_string()))
        .await
        .unwrap();
    assert_eq!(value, "v1");
    assert_eq!(status, CacheStatus::Stale);

    wait_for_refreshes(&cache).await;
    assert_eq!(loader.calls(), 2);

    let (value, status) = cache
        .get_with_status("k", unreachable_loader())
        .await
        .unwrap();
    assert_eq!(value, "v2");
    assert_eq!(status, CacheStatus::Hit);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stale_hits_launch_a_single_refresh() {
    const CALLERS: usize = 16;
    let cache = cache();
    cache.inject("k", "v1".to_string()).await;
    sleep(PAST_REFRESH).await;

    let loader = Loader::gated();
    let barrier = Arc::new(Barrier::new(CALLERS));
    let handles = (0..CALLERS)
        .map(|_| {
            let cache = cache.clone();
            let barrier = Arc::clone(&barrier);
            let load = loader.returning("v2".to_string());
            tokio::spawn(async move {
                barrier.wait().await;
                cache.get_with_status("k", load).await
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        let (value, status) = handle.await.unwrap().unwrap();
        assert_eq!(value, "v1");
        assert_eq!(status, CacheStatus::Stale);
    }

    loader.wait_for_calls(1).await;
    assert_eq!(cache.refreshes_in_flight(), 1);

    // Later stale hits still find the latch held.
    for _ in 0..4 {
        let value = cache
            .get("k", loader.returning("v3".to_string()))
            .await
            .unwrap();
        assert_eq!(value, "v1");
    }

    loader.release(1);
    wait_for_refreshes(&cache).await;
    assert_eq!(loader.calls(), 1);
    assert_eq!(cache.get("k", unreachable_loader()).await.unwrap(), "v2");
}

#[tokio::test]
async fn failed_refresh_keeps_stale_value_and_releases_latch() {
    let cache = cache();
    cache.inject("k", "v1".to_string()).await;
    sleep(PAST_REFRESH).await;

    let loader = Loader::new();
    let value = cache
        .get("k", loader.failing::<String>("upstream timeout"))
        .await
        .unwrap();
    assert_eq!(value, "v1");
    wait_for_refreshes(&cache).await;
    assert_eq!(loader.calls(), 1);

    // The stale value is still served and a new refresh can start.
    let (value, status) = cache
        .get_with_status("k", loader.returning("v2".to_string()))
        .await
        .unwrap();
    assert_eq!(value, "v1");
    assert_eq!(status, CacheStatus::Stale);
    wait_for_refreshes(&cache).await;
    assert_eq!(loader.calls(), 2);

    assert_eq!(cache.get("k", unreachable_loader()).await.unwrap(), "v2");
}

#[tokio::test]
async fn panicking_refresh_releases_latch() {
    let cache = cache();
    cache.inject("k", "v1".to_string()).await;
    sleep(PAST_REFRESH).await;

    let loader = Loader::new();
    cache.get("k", loader.panicking::<String>()).await.unwrap();
    wait_for_refreshes(&cache).await;

    cache
        .get("k", loader.returning("v2".to_string()))
        .await
        .unwrap();
    wait_for_refreshes(&cache).await;
    assert_eq!(loader.calls(), 2);
    assert_eq!(cache.get("k", unreachable_loader()).await.unwrap(), "v2");
}

#[tokio::test]
async fn hung_refresh_blocks_further_refreshes_without_timeout() {
    let cache = cache();
    cache.inject("k", "v1".to_string()).await;
    sleep(PAST_REFRESH).await;

    let loader = Loader::new();
    cache.get("k", loader.hanging::<String>()).await.unwrap();
    loader.wait_for_calls(1).await;

    cache
        .get("k", loader.returning("v2".to_string()))
        .await
        .unwrap();
    assert_eq!(loader.calls(), 1);
    assert_eq!(cache.refreshes_in_flight(), 1);

    cache.cancel_refreshes();
    wait_for_refreshes(&cache).await;

    // Cancelling the task released the latch.
    cache
        .get("k", loader.returning("v2".to_string()))
        .await
        .unwrap();
    wait_for_refreshes(&cache).await;
    assert_eq!(loader.calls(), 2);
}

#[tokio::test]
async fn refresh_timeout_force_releases_latch() {
    let cache: Cache<String> = Cache::from_config(
        CacheConfig::builder()
            .expire_after(Duration::from_secs(10))
            .refresh_after(REFRESH_AFTER)
            .refresh_timeout(Duration::from_millis(50))
            .build(),
    );
    cache.inject("k", "v1".to_string()).await;
    sleep(PAST_REFRESH).await;

    let loader = Loader::new();
    cache.get("k", loader.hanging::<String>()).await.unwrap();
    wait_for_refreshes(&cache).await;

    let value = cache
        .get("k", loader.returning("v2".to_string()))
        .await
        .unwrap();
    assert_eq!(value, "v1");
    wait_for_refreshes(&cache).await;
    assert_eq!(loader.calls(), 2);
    assert_eq!(cache.get("k", unreachable_loader()).await.unwrap(), "v2");
}

#[tokio::test]
async fn superseded_entry_latch_does_not_affect_new_entry() {
    let cache = cache();
    cache.inject("k", "v1".to_string()).await;
    sleep(PAST_REFRESH).await;

    let loader = Loader::gated();
    cache
        .get("k", loader.returning("v2".to_string()))
        .await
        .unwrap();
    loader.wait_for_calls(1).await;

    // Supersede the stale entry while its refresh is still running.
    cache.inject("k", "v3".to_string()).await;
    sleep(PAST_REFRESH).await;

    // The injected entry has its own idle latch.
    let fresh_loader = Loader::new();
    let value = cache
        .get("k", fresh_loader.returning("v4".to_string()))
        .await
        .unwrap();
    assert_eq!(value, "v3");
    fresh_loader.wait_for_calls(1).await;

    loader.release(1);
    wait_for_refreshes(&cache).await;
}

#[tokio::test]
async fn expired_entry_falls_back_to_cold_miss() {
    let cache: Cache<String> = Cache::new(Duration::from_millis(300), Duration::from_millis(100));
    let loader = Loader::new();
    cache
        .get("k", loader.returning("v1".to_string()))
        .await
        .unwrap();

    sleep(Duration::from_millis(400)).await;

    let error = cache
        .get("k", loader.failing::<String>("still down"))
        .await
        .unwrap_err();
    assert_eq!(error.loader_error().to_string(), "still down");
    assert_eq!(loader.calls(), 2);
}

#[tokio::test]
async fn stale_value_served_while_background_refresh_runs() {
    let cache: Cache<String> = Cache::new(Duration::from_secs(10), Duration::from_secs(2));

    let value = cache
        .get("k", || async { Ok::<_, std::io::Error>("v1".to_string()) })
        .await
        .unwrap();
    assert_eq!(value, "v1");

    sleep(Duration::from_secs(3)).await;

    let value = cache
        .get("k", || async { Ok::<_, std::io::Error>("v2".to_string()) })
        .await
        .unwrap();
    assert_eq!(value, "v1");

    wait_for_refreshes(&cache).await;

    let value = cache.get("k", unreachable_loader()).await.unwrap();
    assert_eq!(value, "v2");
}
