//! End-to-end behavior of the fetch-through cache: freshness, scoping,
//! invalidation ordering, and failure passthrough, all through the public
//! API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serial_test::serial;
use uuid::Uuid;

use varco::cache::{
    CacheAccessor, CacheConfig, CacheKey, CacheStore, Invalidator, RequestContext,
};
use varco::domain::types::{ResourceType, Scope};
use varco::infra::upstream::UpstreamError;

fn harness(config: CacheConfig) -> (Arc<CacheStore>, CacheAccessor, Invalidator) {
    let store = Arc::new(CacheStore::new(&config));
    let accessor = CacheAccessor::new(config, Arc::clone(&store));
    let invalidator = Invalidator::new(Arc::clone(&store));
    (store, accessor, invalidator)
}

fn producer(
    calls: &Arc<AtomicUsize>,
    payload: &str,
) -> impl Future<Output = Result<Bytes, UpstreamError>> + Send + 'static {
    let calls = Arc::clone(calls);
    let payload = Bytes::from(payload.to_string());
    async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(payload)
    }
}

#[tokio::test]
async fn fresh_entry_is_served_without_an_upstream_call() {
    let (_, accessor, _) = harness(CacheConfig::default());
    let ctx = RequestContext::anonymous();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let value = accessor
            .fetch_list(&ctx, ResourceType::Role, || producer(&calls, "[\"admin\"]"))
            .await
            .expect("fetch");
        assert_eq!(value, Bytes::from_static(b"[\"admin\"]"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_entry_is_refetched() {
    let mut config = CacheConfig::default();
    config.ttl_overrides_secs.insert(ResourceType::Notification, 0);
    let (_, accessor, _) = harness(config);
    let ctx = RequestContext::for_user(Uuid::from_u128(1));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        accessor
            .fetch_list(&ctx, ResourceType::Notification, || producer(&calls, "[]"))
            .await
            .expect("fetch");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn user_scoped_entries_never_cross_users() {
    let (store, accessor, _) = harness(CacheConfig::default());
    let alice = Uuid::from_u128(1);
    let bob = Uuid::from_u128(2);

    accessor
        .fetch_list(
            &RequestContext::for_user(alice),
            ResourceType::ProfilePlugin,
            || async { Ok(Bytes::from_static(b"[\"alice-plugin\"]")) },
        )
        .await
        .expect("alice fetch");

    let bob_value = accessor
        .fetch_list(
            &RequestContext::for_user(bob),
            ResourceType::ProfilePlugin,
            || async { Ok(Bytes::from_static(b"[\"bob-plugin\"]")) },
        )
        .await
        .expect("bob fetch");

    assert_eq!(bob_value, Bytes::from_static(b"[\"bob-plugin\"]"));
    assert!(
        store
            .get(&CacheKey::list(
                ResourceType::ProfilePlugin,
                Scope::User(alice)
            ))
            .is_some()
    );
    assert!(
        store
            .get(&CacheKey::list(
                ResourceType::ProfilePlugin,
                Scope::User(bob)
            ))
            .is_some()
    );
}

#[tokio::test]
async fn read_after_invalidation_sees_the_new_value() {
    let (_, accessor, invalidator) = harness(CacheConfig::default());
    let ctx = RequestContext::anonymous();

    let before = accessor
        .fetch_count(&ctx, ResourceType::User, || async {
            Ok(Bytes::from_static(b"{\"count\":5}"))
        })
        .await
        .expect("first count");
    assert_eq!(before, Bytes::from_static(b"{\"count\":5}"));

    // A write handler creates a user upstream, then invalidates before it
    // responds.
    invalidator
        .invalidate_collection(&ctx, ResourceType::User)
        .expect("global scope");

    let after = accessor
        .fetch_count(&ctx, ResourceType::User, || async {
            Ok(Bytes::from_static(b"{\"count\":6}"))
        })
        .await
        .expect("second count");
    assert_eq!(after, Bytes::from_static(b"{\"count\":6}"));
}

#[tokio::test]
async fn entity_invalidation_also_refreshes_list_and_count() {
    let (_, accessor, invalidator) = harness(CacheConfig::default());
    let ctx = RequestContext::anonymous();
    let list_calls = Arc::new(AtomicUsize::new(0));
    let count_calls = Arc::new(AtomicUsize::new(0));
    let detail_calls = Arc::new(AtomicUsize::new(0));

    accessor
        .fetch_detail(&ctx, ResourceType::Blog, "post-1", || {
            producer(&detail_calls, "{}")
        })
        .await
        .expect("detail");
    accessor
        .fetch_list(&ctx, ResourceType::Blog, || producer(&list_calls, "[]"))
        .await
        .expect("list");
    accessor
        .fetch_count(&ctx, ResourceType::Blog, || producer(&count_calls, "9"))
        .await
        .expect("count");

    invalidator
        .invalidate_entity(&ctx, ResourceType::Blog, "post-1")
        .expect("global scope");

    accessor
        .fetch_detail(&ctx, ResourceType::Blog, "post-1", || {
            producer(&detail_calls, "{}")
        })
        .await
        .expect("detail again");
    accessor
        .fetch_list(&ctx, ResourceType::Blog, || producer(&list_calls, "[]"))
        .await
        .expect("list again");
    accessor
        .fetch_count(&ctx, ResourceType::Blog, || producer(&count_calls, "9"))
        .await
        .expect("count again");

    assert_eq!(detail_calls.load(Ordering::SeqCst), 2);
    assert_eq!(list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(count_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidation_during_a_fill_forces_a_fresh_upstream_call() {
    let (store, accessor, invalidator) = harness(CacheConfig::default());
    let accessor = Arc::new(accessor);
    let ctx = RequestContext::anonymous();

    // A slow fill is in flight when the write handler invalidates.
    let slow_reader = {
        let accessor = Arc::clone(&accessor);
        tokio::spawn(async move {
            accessor
                .fetch_list(&RequestContext::anonymous(), ResourceType::User, || async {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    Ok(Bytes::from_static(b"pre-write"))
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    invalidator
        .invalidate_collection(&ctx, ResourceType::User)
        .expect("global scope");

    // A read issued after the write must run its own producer.
    let calls = Arc::new(AtomicUsize::new(0));
    let fresh = accessor
        .fetch_list(&ctx, ResourceType::User, || producer(&calls, "post-write"))
        .await
        .expect("post-write fetch");
    assert_eq!(fresh, Bytes::from_static(b"post-write"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The reader that started before the write still gets its answer, but
    // the retired fill must not overwrite the post-write entry.
    let stale = slow_reader
        .await
        .expect("join")
        .expect("pre-write fetch");
    assert_eq!(stale, Bytes::from_static(b"pre-write"));
    assert_eq!(
        store.get(&CacheKey::list(ResourceType::User, Scope::Global)),
        Some(Bytes::from_static(b"post-write"))
    );
}

#[tokio::test]
async fn upstream_failures_are_never_cached() {
    let (store, accessor, _) = harness(CacheConfig::default());
    let ctx = RequestContext::anonymous();

    let err = accessor
        .fetch_detail(&ctx, ResourceType::Media, "m-1", || async {
            Err(UpstreamError::Status {
                status: 500,
                message: "boom".into(),
            })
        })
        .await
        .expect_err("upstream failed");
    assert!(matches!(err, varco::cache::FetchError::Upstream(_)));
    assert!(store.is_empty());

    let value = accessor
        .fetch_detail(&ctx, ResourceType::Media, "m-1", || async {
            Ok(Bytes::from_static(b"{\"id\":\"m-1\"}"))
        })
        .await
        .expect("retry succeeds");
    assert_eq!(value, Bytes::from_static(b"{\"id\":\"m-1\"}"));
}

#[tokio::test]
async fn disabled_cache_calls_upstream_every_time() {
    let config = CacheConfig {
        enabled: false,
        ..Default::default()
    };
    let (store, accessor, _) = harness(config);
    let ctx = RequestContext::anonymous();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        accessor
            .fetch_list(&ctx, ResourceType::Workplace, || producer(&calls, "[]"))
            .await
            .expect("fetch");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(store.is_empty());
}

#[tokio::test]
async fn concurrent_misses_share_one_fill() {
    let (_, accessor, _) = harness(CacheConfig::default());
    let accessor = Arc::new(accessor);
    let calls = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let accessor = Arc::clone(&accessor);
        let calls = Arc::clone(&calls);
        tasks.push(tokio::spawn(async move {
            accessor
                .fetch_list(&RequestContext::anonymous(), ResourceType::User, move || {
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(Bytes::from_static(b"[]"))
                    }
                })
                .await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("fetch");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[serial]
async fn hit_and_miss_counters_are_recorded() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("install recorder");

    let (_, accessor, _) = harness(CacheConfig::default());
    let ctx = RequestContext::anonymous();
    for _ in 0..2 {
        accessor
            .fetch_list(&ctx, ResourceType::Blog, || async {
                Ok(Bytes::from_static(b"[]"))
            })
            .await
            .expect("fetch");
    }

    let entries = snapshotter.snapshot().into_vec();
    let counter_at_least = |name: &str, minimum: u64| {
        entries.iter().any(|(key, _, _, value)| {
            key.key().name() == name && matches!(value, DebugValue::Counter(n) if *n >= minimum)
        })
    };
    assert!(counter_at_least("varco_cache_miss_total", 1));
    assert!(counter_at_least("varco_cache_hit_total", 1));
}
