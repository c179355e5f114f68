//! Viewport to tile index mapping.
//!
//! Implements the "Google Maps" web tiling scheme: the world is first mapped into a
//! 256x256 pixel square, each zoom level doubles the pixel count per axis, and every
//! 256x256 block of pixels is one tile.
//!
//! ## Limitations
//!
//! Only non-negative world coordinates are supported. A viewport that starts before the
//! world extent's minimum corner is rejected with `ViewerError::NegativeCoordinate`
//! instead of being shifted or wrapped.

use serde::{Deserialize, Serialize};

use crate::{Viewport, ViewerError, ViewerResult, WorldExtent};

/// Tile edge length in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Deepest zoom level produced by default (matches the WebMercatorQuad matrix set).
pub const DEFAULT_MAX_LEVEL: u32 = 22;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileIndex {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

}

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Tiles covering a viewport at a single zoom level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSet {
    pub level: u32,
    /// Column-major order: x outer, y inner.
    pub tiles: Vec<TileIndex>,
}

impl TileSet {
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Linear map taking `[x_low, x_high]` onto `[0, y_high - y_low]`.
///
/// The output is offset-free (`y_low` only contributes to the scale), which is what the
/// world-pixel conversion needs when `y_low` is zero.
pub fn interp1d(x_low: f64, x_high: f64, y_low: f64, y_high: f64) -> impl Fn(f64) -> f64 {
    move |x| ((y_high - y_low) * (x - x_low)) / (x_high - x_low)
}

/// Pixel index related to zoom level.
pub fn pixel_index(x: f64, level: u32) -> f64 {
    (x * 2f64.powi(level as i32)).floor()
}

/// Tile index from pixel index, assuming 256x256 tiles.
pub fn tile_index(pixel: f64) -> i64 {
    (pixel / TILE_SIZE).floor() as i64
}

/// Optimal zoom level for a viewport whose normalized size is `dw` by `dh` pixels.
///
/// Returns the unclamped level, which is negative when the viewport is larger than the
/// world.
pub fn zoom_level(dw: f64, dh: f64) -> ViewerResult<i32> {
    let d = dw.min(dh);
    if !dw.is_finite() || !dh.is_finite() || d <= 0.0 {
        return Err(ViewerError::UndefinedZoom {
            width: dw,
            height: dh,
        });
    }
    Ok((TILE_SIZE / d).log2().floor() as i32)
}

/// Converts viewports into the tiles that cover them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileMapper {
    extent: WorldExtent,
    max_level: u32,
}

impl TileMapper {
    pub fn new(extent: WorldExtent) -> Self {
        Self {
            extent,
            max_level: DEFAULT_MAX_LEVEL,
        }
    }

    /// Levels beyond 31 cannot be indexed with `u32` columns and are capped.
    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level.min(31);
        self
    }

    pub fn extent(&self) -> &WorldExtent {
        &self.extent
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Zoom level and tile indices covering `viewport`.
    pub fn tiles(&self, viewport: &Viewport) -> ViewerResult<TileSet> {
        self.extent.validate()?;

        let interp_x = interp1d(self.extent.min_x, self.extent.max_x, 0.0, TILE_SIZE);
        let interp_y = interp1d(self.extent.min_y, self.extent.max_y, 0.0, TILE_SIZE);

        let (x0, x1) = (
            interp_x(viewport.x_range.start),
            interp_x(viewport.x_range.end),
        );
        let (y0, y1) = (
            interp_y(viewport.y_range.start),
            interp_y(viewport.y_range.end),
        );

        let level = zoom_level((x1 - x0).abs(), (y1 - y0).abs())?;
        let level = level.clamp(0, self.max_level as i32) as u32;

        let (x_lo, x_hi) = self.index_range("x", x0, x1, level)?;
        let (y_lo, y_hi) = self.index_range("y", y0, y1, level)?;

        let mut tiles = Vec::new();
        for x in x_lo..=x_hi {
            for y in y_lo..=y_hi {
                tiles.push(TileIndex::new(level, x, y));
            }
        }
        // empty when the viewport lies entirely past the far world edge
        Ok(TileSet { level, tiles })
    }

    /// Inclusive tile index range on one axis, limited to tiles that exist at `level`.
    fn index_range(
        &self,
        axis: &'static str,
        a: f64,
        b: f64,
        level: u32,
    ) -> ViewerResult<(u32, u32)> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        if lo < 0.0 {
            return Err(ViewerError::NegativeCoordinate { axis, value: lo });
        }
        let last = (1u64 << level) - 1;
        let first = tile_index(pixel_index(lo, level)) as u64;
        let end = (tile_index(pixel_index(hi, level)) as u64).min(last);
        if first > end {
            return Ok((1, 0));
        }
        Ok((first as u32, end as u32))
    }
}

impl Default for TileMapper {
    fn default() -> Self {
        Self::new(WorldExtent::web_mercator())
    }
}

/// Free-function form of [`TileMapper::tiles`] with the default maximum level.
pub fn tiles(viewport: &Viewport, extent: &WorldExtent) -> ViewerResult<TileSet> {
    TileMapper::new(*extent).tiles(viewport)
}
