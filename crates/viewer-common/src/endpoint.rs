//! REST endpoint construction.
//!
//! Tile URLs are built in two steps: a per-(dataset, variable, time) template containing
//! `{Z}`, `{X}` and `{Y}` placeholders, then one resolved URL per covering tile.

use crate::tile::{TileIndex, TileMapper};
use crate::{DatasetId, Timestamp, Viewport, ViewerResult};

/// Endpoints of the data server rooted at a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    /// Trailing slashes on `base_url` are dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/datasets`
    pub fn datasets(&self) -> String {
        format!("{}/datasets", self.base_url)
    }

    /// `GET {base}/datasets/{id}`
    pub fn description(&self, dataset: &DatasetId) -> String {
        format!("{}/datasets/{}", self.base_url, dataset)
    }

    /// `GET {base}/datasets/{id}/palette`
    pub fn colorbar(&self, dataset: &DatasetId) -> String {
        format!("{}/datasets/{}/palette", self.base_url, dataset)
    }

    /// `GET {base}/datasets/{label}/times?limit=N`
    pub fn times(&self, label: &str, limit: usize) -> String {
        format!("{}/datasets/{}/times?limit={}", self.base_url, label, limit)
    }

    /// `GET {base}/palettes`
    pub fn palettes(&self) -> String {
        format!("{}/palettes", self.base_url)
    }

    /// Whole-frame image: `GET {base}/datasets/{id}/times/{time}`
    pub fn frame(&self, dataset: &DatasetId, time: Timestamp) -> String {
        format!("{}/datasets/{}/times/{}", self.base_url, dataset, time)
    }

    /// Tile template for one variable at one time, or `None` until both are known.
    pub fn tile_template(
        &self,
        dataset: &DatasetId,
        variable: Option<&str>,
        time: Option<Timestamp>,
    ) -> Option<String> {
        template(&self.base_url, dataset, variable, time)
    }
}

/// Map state to a `{Z}/{X}/{Y}` URL template.
pub fn template(
    base_url: &str,
    dataset: &DatasetId,
    variable: Option<&str>,
    time: Option<Timestamp>,
) -> Option<String> {
    let variable = variable?;
    let time = time?;
    Some(format!(
        "{}/datasets/{}/{}/times/{}/tiles/{{Z}}/{{X}}/{{Y}}",
        base_url, dataset, variable, time
    ))
}

/// Fill in Z, X and Y values.
pub fn resolve(template: &str, tile: &TileIndex) -> String {
    template
        .replace("{Z}", &tile.z.to_string())
        .replace("{X}", &tile.x.to_string())
        .replace("{Y}", &tile.y.to_string())
}

/// Resolved tile URLs covering `viewport`.
///
/// `Ok(None)` means an input is not ready yet; errors only come from viewports the tile
/// math cannot cover.
pub fn urls(
    template: Option<&str>,
    viewport: Option<&Viewport>,
    mapper: &TileMapper,
) -> ViewerResult<Option<Vec<String>>> {
    let (Some(template), Some(viewport)) = (template, viewport) else {
        return Ok(None);
    };
    let tile_set = mapper.tiles(viewport)?;
    Ok(Some(
        tile_set
            .tiles
            .iter()
            .map(|tile| resolve(template, tile))
            .collect(),
    ))
}
