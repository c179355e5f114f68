//! The state container.
//!
//! A [`Store`] owns the current snapshot behind a mutex. `dispatch` runs the pipeline on a
//! working copy, swaps the snapshot in when the run succeeds, then calls subscribers in
//! subscription order with the snapshot lock released so they can read or dispatch again.
//!
//! Commit and notification of one dispatch run under a re-entrant dispatch lock. A
//! dispatch from another thread waits until every subscriber has seen the previous
//! commit, so subscribers observe snapshots in commit order. A subscriber dispatching on
//! the same thread re-enters the lock; once that nested commit has notified everyone, the
//! outer dispatch stops handing out its older snapshot.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::debug;

use crate::action::Action;
use crate::error::{StoreError, StoreResult};
use crate::pipeline::Pipeline;
use crate::state::State;

type Listener = Arc<dyn Fn(&State) + Send + Sync>;

thread_local! {
    // Dispatches currently running on this thread, across all stores
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

struct Inner {
    dispatch: ReentrantMutex<()>,
    state: Mutex<Arc<State>>,
    pipeline: Pipeline,
    subscribers: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Cloneable handle to the viewer state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    pub fn new(initial: State, pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatch: ReentrantMutex::new(()),
                state: Mutex::new(Arc::new(initial)),
                pipeline,
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Store with an empty state and the standard middleware chain.
    pub fn with_defaults() -> Self {
        Self::new(State::default(), Pipeline::standard())
    }

    /// Last committed snapshot.
    pub fn state(&self) -> Arc<State> {
        self.inner.state.lock().clone()
    }

    /// Run `action` through the pipeline and commit the result.
    ///
    /// Returns the actions the reducer applied. On error nothing is committed and no
    /// subscriber is called.
    pub fn dispatch(&self, action: Action) -> StoreResult<Vec<Action>> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let _serial = self.inner.dispatch.lock();
        let nesting = NestingGuard::enter();
        let kind = action.kind();

        let (snapshot, applied) = {
            let mut current = self.inner.state.lock();
            let (next, applied) =
                self.inner
                    .pipeline
                    .run_at_depth(&current, action, nesting.depth)?;
            if applied.is_empty() {
                debug!(action = kind, "Action suppressed");
                return Ok(applied);
            }
            let next = Arc::new(next);
            *current = next.clone();
            (next, applied)
        };

        let listeners: Vec<Listener> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            let current = self.inner.state.lock().clone();
            if !Arc::ptr_eq(&snapshot, &current) {
                // A nested dispatch already notified with a newer snapshot
                break;
            }
            listener(&snapshot);
        }

        Ok(applied)
    }

    /// Register a listener called after every committed dispatch.
    ///
    /// The listener stays registered while the returned [`Subscription`] is alive.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Drop all subscribers and reject further dispatches.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.subscribers.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// Registration handle returned by [`Store::subscribe`].
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    fn remove(&self) {
        if let Some(inner) = self.store.upgrade() {
            inner.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

struct NestingGuard {
    depth: usize,
}

impl NestingGuard {
    fn enter() -> Self {
        let depth = NESTING.with(|n| {
            let depth = n.get();
            n.set(depth + 1);
            depth
        });
        Self { depth }
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        NESTING.with(|n| n.set(n.get().saturating_sub(1)));
    }
}
