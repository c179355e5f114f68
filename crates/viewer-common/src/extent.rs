//! Viewport and world extent types.
//!
//! Coordinates are in the projected plane (metres for Web Mercator).

use serde::{Deserialize, Serialize};

use crate::{ViewerError, ViewerResult};

/// Half the side of the Web Mercator square, in metres.
pub const WEB_MERCATOR_MAX: f64 = 20037508.342789244;

/// One axis of a viewport, as reported by the plotting surface.
///
/// `start` may be greater than `end` when an axis is flipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: f64,
    pub end: f64,
}

impl AxisRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Absolute span of the axis.
    pub fn span(&self) -> f64 {
        (self.end - self.start).abs()
    }

    pub fn is_finite(&self) -> bool {
        self.start.is_finite() && self.end.is_finite()
    }
}

/// The currently visible rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x_range: AxisRange,
    pub y_range: AxisRange,
}

impl Viewport {
    pub fn new(x_range: AxisRange, y_range: AxisRange) -> Self {
        Self { x_range, y_range }
    }

    /// Build a viewport from `[x_start, x_end]` and `[y_start, y_end]`.
    pub fn from_bounds(x: (f64, f64), y: (f64, f64)) -> Self {
        Self {
            x_range: AxisRange::new(x.0, x.1),
            y_range: AxisRange::new(y.0, y.1),
        }
    }
}

/// Fixed bounding box of the projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldExtent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl WorldExtent {
    /// Create a new extent from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Full Web Mercator (EPSG:3857) extent.
    pub fn web_mercator() -> Self {
        Self::new(
            -WEB_MERCATOR_MAX,
            -WEB_MERCATOR_MAX,
            WEB_MERCATOR_MAX,
            WEB_MERCATOR_MAX,
        )
    }

    /// Width of the extent in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the extent in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Reject extents the interpolation cannot divide by.
    pub fn validate(&self) -> ViewerResult<()> {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.width() <= 0.0 || self.height() <= 0.0 {
            return Err(ViewerError::InvalidExtent(format!(
                "{},{},{},{}",
                self.min_x, self.min_y, self.max_x, self.max_y
            )));
        }
        Ok(())
    }
}

impl Default for WorldExtent {
    fn default() -> Self {
        Self::web_mercator()
    }
}
