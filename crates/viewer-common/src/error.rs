//! Error types for the tile viewer.

use thiserror::Error;

/// Result type alias using ViewerError.
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Primary error type for tile math and parsing.
#[derive(Debug, Error)]
pub enum ViewerError {
    // === Tile Math Errors ===
    #[error("Zoom level undefined for viewport with width {width} and height {height}")]
    UndefinedZoom { width: f64, height: f64 },

    #[error("Negative world coordinate on {axis} axis: {value}")]
    NegativeCoordinate { axis: &'static str, value: f64 },

    #[error("Degenerate world extent: {0}")]
    InvalidExtent(String),

    // === Parsing Errors ===
    #[error("Invalid timestamp: {0}")]
    InvalidTime(String),
}

impl ViewerError {
    /// Whether the error comes from a viewport the tile math cannot cover.
    ///
    /// Callers treat these as "nothing to draw" rather than a failure.
    pub fn is_viewport_error(&self) -> bool {
        matches!(
            self,
            ViewerError::UndefinedZoom { .. } | ViewerError::NegativeCoordinate { .. }
        )
    }
}
