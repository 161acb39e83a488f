mod common;

use common::MockStore;
use rowcache_core::{CacheConfig, CacheEngine, CacheError, Codec, ComputeCache};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn compute_cache() -> (ComputeCache, Arc<MockStore>) {
    let store = Arc::new(MockStore::new());
    let engine = Arc::new(CacheEngine::new(store.clone(), CacheConfig::default()));
    (ComputeCache::new(engine), store)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Report {
    year: i32,
    totals: Vec<u64>,
    title: String,
}

fn report() -> Report {
    Report {
        year: 2024,
        totals: vec![3, 1, 4],
        title: "annual".into(),
    }
}

#[tokio::test]
async fn test_compute_runs_once_within_ttl() {
    let (cache, store) = compute_cache();
    let calls = AtomicUsize::new(0);
    let hour = Duration::from_secs(3600);

    for _ in 0..2 {
        let value: Report = cache
            .get_or_set("report:2024", hour, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(report())
            })
            .await
            .unwrap();
        assert_eq!(value, report());
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.writes(),
        vec![("cache:@compute:report:2024".to_string(), hour)]
    );
}

#[tokio::test]
async fn test_failed_compute_is_not_cached() {
    let (cache, store) = compute_cache();

    let err = cache
        .get_or_set::<Report, _, _, _>("report:broken", Duration::from_secs(60), || async {
            Err("upstream timed out")
        })
        .await
        .unwrap_err();
    assert_eq!(err, CacheError::Compute("upstream timed out".into()));
    assert!(store.writes().is_empty());

    let value: Report = cache
        .get_or_set("report:broken", Duration::from_secs(60), || async {
            Ok::<_, CacheError>(report())
        })
        .await
        .unwrap();
    assert_eq!(value, report());
}

#[tokio::test]
async fn test_expired_entry_is_recomputed() {
    let (cache, _store) = compute_cache();
    let calls = AtomicUsize::new(0);
    let ttl = Duration::from_millis(40);

    for _ in 0..2 {
        let _: u64 = cache
            .get_or_set("ticks", ttl, || async {
                Ok::<_, CacheError>(calls.fetch_add(1, Ordering::SeqCst) as u64)
            })
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    let value: u64 = cache
        .get_or_set("ticks", ttl, || async {
            Ok::<_, CacheError>(calls.fetch_add(1, Ordering::SeqCst) as u64)
        })
        .await
        .unwrap();
    assert_eq!(value, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_forget_forces_recompute() {
    let (cache, _store) = compute_cache();
    let calls = AtomicUsize::new(0);
    let compute = || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, CacheError>(7u32)
    };

    let _: u32 = cache
        .get_or_set("seven", Duration::from_secs(60), compute)
        .await
        .unwrap();
    assert!(cache.forget("seven").await.unwrap());
    assert!(!cache.forget("seven").await.unwrap());
    let _: u32 = cache
        .get_or_set("seven", Duration::from_secs(60), compute)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_generic_decode_yields_plain_containers() {
    let (cache, _store) = compute_cache();

    let _: Report = cache
        .get_or_set("report:2024", Duration::from_secs(60), || async {
            Ok::<_, CacheError>(report())
        })
        .await
        .unwrap();

    let generic: serde_json::Value = cache
        .get_or_set("report:2024", Duration::from_secs(60), || async {
            Ok::<_, CacheError>(serde_json::Value::Null)
        })
        .await
        .unwrap();

    assert_eq!(
        generic,
        serde_json::json!({ "year": 2024, "totals": [3, 1, 4], "title": "annual" })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_computation() {
    let (cache, _store) = compute_cache();
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_set("expensive", Duration::from_secs(60), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, CacheError>(report())
                    })
                    .await
            })
        })
        .collect();

    for joined in futures::future::join_all(handles).await {
        assert_eq!(joined.unwrap().unwrap(), report());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_value_json_cannot_represent_is_not_cached() {
    let (cache, store) = compute_cache();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let err = cache
            .get_or_set::<f64, _, _, _>("ratio", Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(f64::INFINITY)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)), "{:?}", err);
    }

    // Nothing was written, so each call recomputes instead of failing on a
    // poisoned entry.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(store.writes().is_empty());
    assert!(store.raw("cache:@compute:ratio").is_none());
}

#[tokio::test]
async fn test_messagepack_keeps_infinite_values() {
    let store = Arc::new(MockStore::new());
    let config = CacheConfig::default().with_codec(Codec::MessagePack);
    let cache = ComputeCache::new(Arc::new(CacheEngine::new(store.clone(), config)));

    let value: f64 = cache
        .get_or_set("ratio", Duration::from_secs(60), || async {
            Ok::<_, CacheError>(f64::INFINITY)
        })
        .await
        .unwrap();

    assert_eq!(value, f64::INFINITY);
    assert_eq!(store.writes().len(), 1);
}
