//! Error types for the state store.

use thiserror::Error;

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Middleware or subscribers kept dispatching follow-up actions past the limit.
    #[error("Dispatch depth {depth} exceeded while handling {action}")]
    DispatchDepthExceeded { depth: usize, action: &'static str },

    #[error("Store has been closed")]
    Closed,
}
