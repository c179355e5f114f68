//! Column table of every payload fetched so far.
//!
//! Payloads are appended, never replaced: each key becomes a column, array values add one
//! row per element and scalars add a single row. The [`URL_COLUMN`] records which URL each
//! row came from, and the active index list selects the rows a renderer should draw.

use std::collections::BTreeMap;
use std::ops::Range;

use serde_json::{Map, Value};

use viewer_common::Limits;

/// Column holding the source URL of each row.
pub const URL_COLUMN: &str = "url";

/// Column holding the image arrays of tiles and frames.
pub const IMAGE_COLUMN: &str = "image";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStore {
    columns: BTreeMap<String, Vec<Value>>,
    urls: Vec<String>,
    active: Vec<usize>,
}

impl ColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Append one payload, returning the rows it occupies.
    ///
    /// Columns stay rectangular: keys missing from this payload, and keys seen for the first
    /// time, are padded with nulls.
    pub fn append(&mut self, url: &str, payload: &Map<String, Value>) -> Range<usize> {
        let start = self.len();
        let rows = payload
            .values()
            .map(|value| match value {
                Value::Array(items) => items.len(),
                _ => 1,
            })
            .max()
            .unwrap_or(1)
            .max(1);
        let end = start + rows;

        for (key, value) in payload {
            if key == URL_COLUMN {
                continue;
            }
            let column = self
                .columns
                .entry(key.clone())
                .or_insert_with(|| vec![Value::Null; start]);
            match value {
                Value::Array(items) => column.extend(items.iter().cloned()),
                scalar => column.push(scalar.clone()),
            }
        }
        for column in self.columns.values_mut() {
            column.resize(end, Value::Null);
        }
        self.urls.extend(std::iter::repeat(url.to_string()).take(rows));

        start..end
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        if name == URL_COLUMN {
            return None;
        }
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Source URL of each row.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|u| u == url)
    }

    /// Row indices holding data from `url`, ascending.
    pub fn rows_for(&self, url: &str) -> Vec<usize> {
        self.urls
            .iter()
            .enumerate()
            .filter(|(_, u)| *u == url)
            .map(|(i, _)| i)
            .collect()
    }

    /// Rows to draw.
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    /// Replace the active rows with those belonging to `urls`.
    pub fn activate<S: AsRef<str>>(&mut self, urls: &[S]) {
        let mut active: Vec<usize> = urls
            .iter()
            .flat_map(|url| self.rows_for(url.as_ref()))
            .collect();
        active.sort_unstable();
        active.dedup();
        self.active = active;
    }

    /// Color limits spanning the finite values in the active rows' images.
    ///
    /// `None` when no active row holds a number.
    pub fn image_limits(&self) -> Option<Limits> {
        let images = self.columns.get(IMAGE_COLUMN)?;
        let mut range: Option<(f64, f64)> = None;
        for &row in &self.active {
            if let Some(image) = images.get(row) {
                extend_range(image, &mut range);
            }
        }
        range.map(|(low, high)| Limits::new(low, high))
    }

    /// Add rows to the active set.
    pub fn extend_active(&mut self, rows: Range<usize>) {
        for row in rows {
            if let Err(pos) = self.active.binary_search(&row) {
                self.active.insert(pos, row);
            }
        }
    }
}

fn extend_range(value: &Value, range: &mut Option<(f64, f64)>) {
    match value {
        Value::Number(n) => {
            let Some(x) = n.as_f64().filter(|x| x.is_finite()) else {
                return;
            };
            *range = Some(match *range {
                Some((low, high)) => (low.min(x), high.max(x)),
                None => (x, x),
            });
        }
        Value::Array(items) => {
            for item in items {
                extend_range(item, range);
            }
        }
        _ => {}
    }
}
