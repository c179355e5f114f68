//! Color palette catalog and selection helpers.

use serde::{Deserialize, Deserializer, Serialize};

/// One named, numbered color ramp from the palette catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub name: String,

    /// Number of colors in the ramp. Sent as `"7"` or `7`.
    #[serde(deserialize_with = "deserialize_number")]
    pub number: u32,

    #[serde(alias = "palette", default)]
    pub colors: Vec<String>,
}

impl PaletteEntry {
    pub fn new(name: impl Into<String>, number: u32, colors: Vec<String>) -> Self {
        Self {
            name: name.into(),
            number,
            colors,
        }
    }
}

fn deserialize_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid palette number: {}", s))),
    }
}

/// Color mapper limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub low: f64,
    pub high: f64,
}

impl Limits {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

/// Palette currently applied to the color mapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedPalette {
    pub low: f64,
    pub high: f64,
    pub colors: Vec<String>,
}

/// Body of `GET /datasets/{id}/palette`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetColorbar {
    pub palette: Vec<String>,
    pub low: f64,
    pub high: f64,
}

impl DatasetColorbar {
    pub fn limits(&self) -> Limits {
        Limits::new(self.low, self.high)
    }
}

/// Sorted, de-duplicated palette names in the catalog.
pub fn palette_names(catalog: &[PaletteEntry]) -> Vec<String> {
    let mut names: Vec<String> = catalog.iter().map(|p| p.name.clone()).collect();
    names.sort();
    names.dedup();
    names
}

/// Ascending, de-duplicated numbers available for `name`.
pub fn palette_numbers(catalog: &[PaletteEntry], name: &str) -> Vec<u32> {
    let mut numbers: Vec<u32> = catalog
        .iter()
        .filter(|p| p.name == name)
        .map(|p| p.number)
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

/// Catalog entry matching both `name` and `number`.
pub fn find_palette<'a>(
    catalog: &'a [PaletteEntry],
    name: &str,
    number: u32,
) -> Option<&'a PaletteEntry> {
    catalog
        .iter()
        .find(|p| p.name == name && p.number == number)
}
