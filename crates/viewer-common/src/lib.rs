//! Common types and utilities shared by the tile viewer crates.

pub mod dataset;
pub mod endpoint;
pub mod error;
pub mod extent;
pub mod palette;
pub mod tile;
pub mod time;

pub use dataset::{DataVar, Dataset, DatasetDescription, DatasetId, DatasetsResponse};
pub use endpoint::Endpoints;
pub use error::{ViewerError, ViewerResult};
pub use extent::{AxisRange, Viewport, WorldExtent};
pub use palette::{DatasetColorbar, Limits, PaletteEntry, SelectedPalette};
pub use tile::{TileIndex, TileMapper, TileSet};
pub use time::Timestamp;
