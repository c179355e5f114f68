//! Per-URL fetch deduplication.
//!
//! Each URL has at most one request in flight. Callers asking for a pending URL join the
//! shared request; a URL that succeeded is never fetched again and its rows are simply
//! reactivated. A failed URL stays failed until someone asks for it again, which starts a
//! fresh attempt.
//!
//! Requests run on their own tokio task, so dropping every caller does not cancel one.
//! Results of requests whose URL is no longer wanted are still appended to the column
//! table; they are only left out of the active rows.
//!
//! ## Metrics
//!
//! - `tile_fetch_requests_total`: requests issued
//! - `tile_fetch_dedup_total`: callers that joined an in-flight request
//! - `tile_fetch_failures_total`: requests that failed
//! - `tile_fetch_in_flight`: requests currently outstanding

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use viewer_store::{Action, Store};

use crate::client::Fetcher;
use crate::columns::ColumnStore;
use crate::error::{FetchError, FetchResult};

/// Decoded body of one request.
pub type Payload = Map<String, Value>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult<Arc<Payload>>>>;

/// Externally visible state of one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Pending,
    Success,
    Failed(String),
}

enum Record {
    Pending(SharedFetch),
    Success(Arc<Payload>),
    Failed(FetchError),
}

#[derive(Default)]
struct CacheInner {
    records: HashMap<String, Record>,
    columns: ColumnStore,
    wanted: Vec<String>,
}

/// Counters for the fetch cache.
#[derive(Default)]
pub struct FetchCacheStats {
    /// Requests issued
    pub requests: AtomicU64,
    /// Callers joined onto an in-flight request
    pub deduplicated: AtomicU64,
    /// Callers served from a previous success
    pub reused: AtomicU64,
    /// Failed requests
    pub failures: AtomicU64,
}

impl FetchCacheStats {
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn deduplicated(&self) -> u64 {
        self.deduplicated.load(Ordering::Relaxed)
    }

    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Deduplicating fetcher that accumulates results into a [`ColumnStore`].
pub struct FetchCache<F: Fetcher> {
    fetcher: Arc<F>,
    inner: Arc<Mutex<CacheInner>>,
    store: Option<Store>,
    stats: Arc<FetchCacheStats>,
}

impl<F: Fetcher> Clone for FetchCache<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            inner: self.inner.clone(),
            store: self.store.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<F: Fetcher> FetchCache<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            inner: Arc::new(Mutex::new(CacheInner::default())),
            store: None,
            stats: Arc::new(FetchCacheStats::default()),
        }
    }

    /// Report request lifecycle to `store` as FETCH_* actions.
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn stats(&self) -> &FetchCacheStats {
        &self.stats
    }

    pub fn status(&self, url: &str) -> Option<FetchStatus> {
        self.inner.lock().records.get(url).map(|record| match record {
            Record::Pending(_) => FetchStatus::Pending,
            Record::Success(_) => FetchStatus::Success,
            Record::Failed(err) => FetchStatus::Failed(err.to_string()),
        })
    }

    /// Snapshot of the accumulated column table.
    pub fn columns(&self) -> ColumnStore {
        self.inner.lock().columns.clone()
    }

    /// Run `f` against the column table without copying it.
    pub fn with_columns<R>(&self, f: impl FnOnce(&ColumnStore) -> R) -> R {
        f(&self.inner.lock().columns)
    }

    /// Fetch `url` unless it is loaded or loading, and make its rows the active ones.
    pub async fn ensure(&self, url: &str) -> FetchResult<Arc<Payload>> {
        self.set_wanted(&[url]);
        self.ensure_one(url).await
    }

    /// Fetch every URL of a batch concurrently; the batch becomes the active set.
    pub async fn ensure_all<S: AsRef<str>>(&self, urls: &[S]) -> Vec<FetchResult<Arc<Payload>>> {
        self.set_wanted(urls);
        join_all(urls.iter().map(|url| self.ensure_one(url.as_ref()))).await
    }

    fn set_wanted<S: AsRef<str>>(&self, urls: &[S]) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.wanted = urls.iter().map(|u| u.as_ref().to_string()).collect();
        inner.columns.activate(inner.wanted.as_slice());
    }

    async fn ensure_one(&self, url: &str) -> FetchResult<Arc<Payload>> {
        let (request, issued) = {
            let mut inner = self.inner.lock();
            let joined = match inner.records.get(url) {
                Some(Record::Success(payload)) => {
                    self.stats.reused.fetch_add(1, Ordering::Relaxed);
                    debug!(url = %url, "Already loaded");
                    return Ok(payload.clone());
                }
                Some(Record::Pending(request)) => Some(request.clone()),
                Some(Record::Failed(_)) | None => None,
            };
            match joined {
                Some(request) => {
                    self.stats.deduplicated.fetch_add(1, Ordering::Relaxed);
                    counter!("tile_fetch_dedup_total").increment(1);
                    debug!(url = %url, "Joining in-flight request");
                    (request, None)
                }
                None => {
                    let (request, go) = self.start(url);
                    inner
                        .records
                        .insert(url.to_string(), Record::Pending(request.clone()));
                    (request, Some(go))
                }
            }
        };

        // Reported before the request task may run, so FETCH_STARTED precedes its outcome
        if let Some(go) = issued {
            if let Some(store) = &self.store {
                dispatch(store, Action::FetchStarted(url.to_string()));
            }
            let _ = go.send(());
        }
        request.await
    }

    /// Spawn the request for `url`; it waits for the returned sender before fetching.
    fn start(&self, url: &str) -> (SharedFetch, oneshot::Sender<()>) {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        counter!("tile_fetch_requests_total").increment(1);
        gauge!("tile_fetch_in_flight").increment(1.0);
        info!(url = %url, "Fetching");

        let fetcher = self.fetcher.clone();
        let inner = self.inner.clone();
        let store = self.store.clone();
        let stats = self.stats.clone();
        let url = url.to_string();
        let (go_tx, go_rx) = oneshot::channel();

        let task = tokio::spawn({
            let url = url.clone();
            async move {
                let _ = go_rx.await;
                let result = fetcher.fetch_json(&url).await.and_then(|body| match body {
                    Value::Object(map) => Ok(Arc::new(map)),
                    other => Err(FetchError::Decode {
                        url: url.clone(),
                        message: format!("expected a JSON object, got {}", kind_of(&other)),
                    }),
                });
                complete(&inner, &stats, store.as_ref(), &url, &result);
                result
            }
        });

        let request = async move {
            task.await.unwrap_or_else(|e| {
                Err(FetchError::Request {
                    url,
                    message: format!("fetch task aborted: {}", e),
                })
            })
        }
        .boxed()
        .shared();
        (request, go_tx)
    }
}

fn complete(
    inner: &Mutex<CacheInner>,
    stats: &FetchCacheStats,
    store: Option<&Store>,
    url: &str,
    result: &FetchResult<Arc<Payload>>,
) {
    gauge!("tile_fetch_in_flight").decrement(1.0);

    let action = {
        let mut inner = inner.lock();
        match result {
            Ok(payload) => {
                let rows = inner.columns.append(url, payload);
                if inner.wanted.iter().any(|w| w == url) {
                    inner.columns.extend_active(rows.clone());
                }
                inner
                    .records
                    .insert(url.to_string(), Record::Success(payload.clone()));
                debug!(url = %url, rows = rows.len(), "Appended payload");
                Action::FetchSucceeded(url.to_string())
            }
            Err(err) => {
                stats.failures.fetch_add(1, Ordering::Relaxed);
                counter!("tile_fetch_failures_total").increment(1);
                warn!(url = %url, error = %err, "Fetch failed");
                inner
                    .records
                    .insert(url.to_string(), Record::Failed(err.clone()));
                Action::FetchFailed {
                    url: url.to_string(),
                    message: err.to_string(),
                }
            }
        }
    };

    if let Some(store) = store {
        dispatch(store, action);
    }
}

fn dispatch(store: &Store, action: Action) {
    if let Err(e) = store.dispatch(action) {
        warn!(error = %e, "Failed to report fetch state");
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
