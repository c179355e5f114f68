//! Network access for the tile viewer.
//!
//! - [`client`]: the [`Fetcher`] seam and its reqwest implementation, plus typed calls
//!   for the catalog endpoints.
//! - [`fetch_cache`]: per-URL request deduplication with accumulated results.
//! - [`columns`]: the column table fetched payloads are appended to.

pub mod client;
pub mod columns;
pub mod error;
pub mod fetch_cache;

pub use client::{Fetcher, HttpFetcher, ViewerApi};
pub use columns::{ColumnStore, IMAGE_COLUMN, URL_COLUMN};
pub use error::{FetchError, FetchResult};
pub use fetch_cache::{FetchCache, FetchCacheStats, FetchStatus, Payload};
