//! Application state for the tile viewer.
//!
//! A single [`Store`] owns the root [`State`]. Every change goes through
//! [`Store::dispatch`]: the action passes an ordered middleware [`Pipeline`], the
//! resulting actions are applied by the pure [`reduce`] function, and subscribers are
//! notified with the committed snapshot.

pub mod action;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod state;
pub mod store;

pub use action::Action;
pub use error::{StoreError, StoreResult};
pub use middleware::wrap;
pub use pipeline::{Chain, Middleware, Pipeline, DEFAULT_MAX_DISPATCH_DEPTH};
pub use state::{reduce, FetchFailure, State};
pub use store::{Store, Subscription};
