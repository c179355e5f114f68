//! Tests for request deduplication and payload accumulation.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio_test::assert_ok;

use tile_fetch::{FetchCache, FetchError, FetchResult, FetchStatus, Fetcher};
use viewer_store::Store;

/// Scripted responses per URL; the last response for a URL repeats.
#[derive(Default)]
struct MockFetcher {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, u16>>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl MockFetcher {
    fn new() -> Self {
        Self::default()
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn respond(self, url: &str, response: Result<Value, u16>) -> Self {
        self.responses
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch_json(&self, url: &str) -> FetchResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let response = {
            let mut responses = self.responses.lock();
            let queue = responses.get_mut(url);
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match response {
            Some(Ok(body)) => Ok(body),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn tile(x: f64) -> Value {
    json!({"x": [x], "y": [0.0], "dw": [1.0], "dh": [1.0], "image": [[[0.0]]], "units": ["K"]})
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Deduplication tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_ensure_issues_one_request() {
    let fetcher = Arc::new(MockFetcher::new().respond("a", Ok(tile(0.0))));
    let cache = FetchCache::new(fetcher.clone());

    let (first, second) = tokio::join!(cache.ensure("a"), cache.ensure("a"));

    assert_eq!(fetcher.calls(), 1);
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert_eq!(cache.stats().deduplicated(), 1);
    assert_eq!(cache.columns().len(), 1);
}

#[tokio::test]
async fn test_loaded_url_not_fetched_again() {
    let fetcher = Arc::new(MockFetcher::new().respond("a", Ok(tile(0.0))));
    let cache = FetchCache::new(fetcher.clone());

    assert_ok!(cache.ensure("a").await);
    assert_ok!(cache.ensure("a").await);

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(cache.stats().reused(), 1);
    assert_eq!(cache.status("a"), Some(FetchStatus::Success));
    assert_eq!(cache.columns().len(), 1);
}

#[tokio::test]
async fn test_concurrent_failure_shared_by_callers() {
    let fetcher = Arc::new(MockFetcher::new().respond("a", Err(500)));
    let cache = FetchCache::new(fetcher.clone());

    let (first, second) = tokio::join!(cache.ensure("a"), cache.ensure("a"));

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(first.unwrap_err(), second.unwrap_err());
}

// ============================================================================
// Failure tests
// ============================================================================

#[tokio::test]
async fn test_failure_recorded_without_retry() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .respond("a", Err(503))
            .respond("a", Ok(tile(1.0))),
    );
    let cache = FetchCache::new(fetcher.clone());

    let err = cache.ensure("a").await.unwrap_err();
    assert_eq!(
        err,
        FetchError::Status {
            url: "a".into(),
            status: 503
        }
    );
    settle().await;
    assert_eq!(fetcher.calls(), 1);
    assert!(matches!(cache.status("a"), Some(FetchStatus::Failed(_))));
    assert!(cache.columns().is_empty());

    // Asking again is a new attempt
    cache.ensure("a").await.unwrap();
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(cache.status("a"), Some(FetchStatus::Success));
    assert_eq!(cache.stats().failures(), 1);
}

#[tokio::test]
async fn test_non_object_payload_rejected() {
    let fetcher = Arc::new(MockFetcher::new().respond("a", Ok(json!([1, 2]))));
    let cache = FetchCache::new(fetcher);

    assert!(matches!(
        cache.ensure("a").await,
        Err(FetchError::Decode { .. })
    ));
}

// ============================================================================
// Accumulation tests
// ============================================================================

#[tokio::test]
async fn test_payloads_accumulate_and_reactivate() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .respond("a", Ok(tile(0.0)))
            .respond("b", Ok(tile(5.0))),
    );
    let cache = FetchCache::new(fetcher.clone());

    cache.ensure("a").await.unwrap();
    cache.ensure("b").await.unwrap();

    let columns = cache.columns();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns.column("x").unwrap(), &[json!(0.0), json!(5.0)]);
    assert_eq!(columns.urls(), &["a".to_string(), "b".to_string()]);
    assert_eq!(columns.active(), &[1]);

    // Already seen: rows switch back without a request
    cache.ensure("a").await.unwrap();
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(cache.with_columns(|c| c.active().to_vec()), vec![0]);
}

#[tokio::test]
async fn test_batch_becomes_active_set() {
    let fetcher = Arc::new(
        MockFetcher::new()
            .respond("a", Ok(tile(0.0)))
            .respond("b", Ok(tile(1.0)))
            .respond("c", Ok(tile(2.0))),
    );
    let cache = FetchCache::new(fetcher.clone());

    let results = cache.ensure_all(&["a", "b", "c"]).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(cache.columns().active().len(), 3);

    let results = cache.ensure_all(&["c", "a"]).await;
    assert_eq!(results.len(), 2);
    assert_eq!(fetcher.calls(), 3);

    let columns = cache.columns();
    let active_urls: Vec<&str> = columns
        .active()
        .iter()
        .map(|&row| columns.urls()[row].as_str())
        .collect();
    assert_eq!(active_urls, vec!["a", "c"]);
}

#[tokio::test]
async fn test_superseded_result_kept_but_inactive() {
    let gate = Arc::new(Notify::new());
    let fetcher = Arc::new(
        MockFetcher::gated(gate.clone())
            .respond("old", Ok(tile(0.0)))
            .respond("new", Ok(tile(1.0))),
    );
    let cache = FetchCache::new(fetcher.clone());

    let stale = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.ensure("old").await })
    };
    settle().await;

    let fresh = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.ensure("new").await })
    };
    settle().await;
    assert_eq!(fetcher.calls(), 2);

    gate.notify_one();
    gate.notify_one();
    stale.await.unwrap().unwrap();
    fresh.await.unwrap().unwrap();

    let columns = cache.columns();
    assert_eq!(columns.len(), 2);
    assert!(columns.contains("old"));
    assert_eq!(columns.active(), columns.rows_for("new").as_slice());
}

// ============================================================================
// Store reporting tests
// ============================================================================

#[tokio::test]
async fn test_store_tracks_in_flight_requests() {
    let gate = Arc::new(Notify::new());
    let fetcher = Arc::new(MockFetcher::gated(gate.clone()).respond("a", Ok(tile(0.0))));
    let store = Store::with_defaults();
    let cache = FetchCache::new(fetcher.clone()).with_store(store.clone());

    let pending = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.ensure("a").await })
    };
    settle().await;
    assert!(store.state().is_fetching());
    assert_eq!(cache.status("a"), Some(FetchStatus::Pending));

    gate.notify_one();
    pending.await.unwrap().unwrap();
    assert!(!store.state().is_fetching());
}

#[tokio::test]
async fn test_store_reports_fetching_as_soon_as_request_issued() {
    let gate = Arc::new(Notify::new());
    let fetcher = Arc::new(MockFetcher::gated(gate.clone()).respond("a", Ok(tile(0.0))));
    let store = Store::with_defaults();
    let cache = FetchCache::new(fetcher.clone()).with_store(store.clone());

    // One poll issues the request; the fetch task itself has not run yet
    let mut pending = Box::pin(cache.ensure("a"));
    assert!(futures::poll!(pending.as_mut()).is_pending());
    assert_eq!(fetcher.calls(), 0);
    assert!(store.state().is_fetching());

    gate.notify_one();
    pending.await.unwrap();
    assert!(!store.state().is_fetching());
}

#[tokio::test]
async fn test_store_records_failure() {
    let fetcher = Arc::new(MockFetcher::new().respond("a", Err(502)));
    let store = Store::with_defaults();
    let cache = FetchCache::new(fetcher).with_store(store.clone());

    cache.ensure("a").await.unwrap_err();

    let state = store.state();
    assert!(!state.is_fetching());
    let failure = state.last_fetch_error.clone().unwrap();
    assert_eq!(failure.url, "a");
    assert!(failure.message.contains("502"));
}
