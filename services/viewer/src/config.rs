//! Configuration loading for the viewer.
//!
//! A single YAML file; every field has a default so an empty file is valid.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use viewer_common::tile::DEFAULT_MAX_LEVEL;
use viewer_common::{Limits, Viewport, WorldExtent};

use crate::scheduler::DEFAULT_PERIOD;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    /// Data server root, e.g. `http://localhost:8888`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Projection bounds tiles are computed against
    #[serde(default)]
    pub world_extent: WorldExtent,
    /// Map viewport to keep covered with tiles
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u32,
    #[serde(default)]
    pub animation: AnimationConfig,
    /// Number of most recent times requested per dataset
    #[serde(default = "default_times_limit")]
    pub times_limit: usize,
    /// Color limits applied before a dataset palette arrives
    #[serde(default)]
    pub limits: Option<Limits>,
    #[serde(default)]
    pub palette: Option<PaletteSelection>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8888".to_string()
}

fn default_max_zoom() -> u32 {
    DEFAULT_MAX_LEVEL
}

fn default_times_limit() -> usize {
    7
}

fn default_request_timeout() -> u64 {
    30
}

/// Animation clock settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Start playing once times are loaded
    #[serde(default)]
    pub autoplay: bool,
}

fn default_period_ms() -> u64 {
    DEFAULT_PERIOD.as_millis() as u64
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            autoplay: false,
        }
    }
}

/// Palette chosen from the catalog at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct PaletteSelection {
    pub name: String,
    pub number: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            world_extent: WorldExtent::default(),
            viewport: None,
            max_zoom: default_max_zoom(),
            animation: AnimationConfig::default(),
            times_limit: default_times_limit(),
            limits: None,
            palette: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ViewerConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(base_url = %config.base_url, path = %path.display(), "Loaded viewer config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes as null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ViewerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the viewer cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.world_extent
            .validate()
            .context("Invalid world_extent")?;
        if self.animation.period_ms == 0 {
            anyhow::bail!("animation.period_ms must be positive");
        }
        if self.times_limit == 0 {
            anyhow::bail!("times_limit must be positive");
        }
        Ok(())
    }
}
