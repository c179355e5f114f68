//! Animation clock.
//!
//! Ticks on a fixed period. A tick advances the time index only while playing, and is
//! skipped entirely while any request is outstanding so frames never run ahead of data.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use viewer_store::{Action, Store};

/// Default tick period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A request was in flight
    Fetching,
    Paused,
    Advanced,
    /// The store rejected the dispatch
    Failed,
}

pub struct AnimationScheduler {
    store: Store,
    period: Duration,
}

impl AnimationScheduler {
    pub fn new(store: Store, period: Duration) -> Self {
        Self { store, period }
    }

    /// Run one tick against the current state.
    pub fn tick(&self) -> TickOutcome {
        let state = self.store.state();
        if state.is_fetching() {
            debug!(in_flight = state.in_flight.len(), "Skipping tick while fetching");
            return TickOutcome::Fetching;
        }
        if !state.playing {
            return TickOutcome::Paused;
        }

        match self.store.dispatch(Action::AdvanceTime) {
            Ok(_) => TickOutcome::Advanced,
            Err(e) => {
                warn!(error = %e, "Failed to advance time");
                TickOutcome::Failed
            }
        }
    }

    /// Tick until a shutdown signal arrives. The first tick fires immediately.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(period_ms = self.period.as_millis() as u64, "Starting animation clock");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down animation clock");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// Run on a background task. Abort the handle or send on `shutdown` to stop it.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_forever(shutdown).await })
    }
}
