//! Viewer session: loads catalog data into the store and keeps tiles in sync with it.
//!
//! Store subscriptions drive the session once [`Session::watch`] is called:
//! - a dataset watcher fetches the description, palette and times of each newly selected
//!   dataset;
//! - a tile watcher recomputes the wanted URLs whenever the template or viewport changes
//!   and ensures them through the fetch cache;
//! - a title watcher logs each new frame.
//!
//! Datasets served without a colorbar get their color limits from the loaded images:
//! after each tile batch the limits are reset to the range of the active rows.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use tile_fetch::{ColumnStore, FetchCache, Fetcher, ViewerApi};
use viewer_common::{endpoint, DatasetId, TileMapper, ViewerResult, Viewport};
use viewer_store::{Action, State, Store, Subscription};

use crate::config::ViewerConfig;

pub struct Session<F: Fetcher> {
    config: ViewerConfig,
    store: Store,
    api: ViewerApi<F>,
    cache: FetchCache<F>,
    mapper: TileMapper,
    /// Datasets whose colorbar endpoint supplied limits
    colorbars: Mutex<HashSet<DatasetId>>,
}

impl<F: Fetcher> Session<F> {
    pub fn new(
        config: ViewerConfig,
        store: Store,
        api: ViewerApi<F>,
        cache: FetchCache<F>,
    ) -> Self {
        let mapper = TileMapper::new(config.world_extent).with_max_level(config.max_zoom);
        Self {
            config,
            store,
            api,
            cache,
            mapper,
            colorbars: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cache(&self) -> &FetchCache<F> {
        &self.cache
    }

    /// Seed the store from configuration, then load datasets and the palette catalog.
    ///
    /// A missing palette catalog only disables palette selection.
    pub async fn load_catalog(&self) -> Result<()> {
        if let Some(viewport) = self.config.viewport {
            self.store.dispatch(Action::SetViewport(viewport))?;
        }
        if let Some(limits) = self.config.limits {
            self.store.dispatch(Action::SetLimits(limits))?;
        }

        match self.api.palettes().await {
            Ok(catalog) => {
                info!(count = catalog.len(), "Loaded palette catalog");
                self.store.dispatch(Action::SetPalettes(catalog))?;
                if let Some(selection) = &self.config.palette {
                    self.store
                        .dispatch(Action::SetPaletteName(selection.name.clone()))?;
                    self.store
                        .dispatch(Action::SetPaletteNumber(selection.number))?;
                }
            }
            Err(e) => warn!(error = %e, "Palette catalog unavailable"),
        }

        let datasets = self
            .api
            .datasets()
            .await
            .context("Failed to load datasets")?;
        info!(count = datasets.len(), "Loaded datasets");
        self.store.dispatch(Action::SetDatasets(datasets))?;
        Ok(())
    }

    /// Fetch description, palette and times for `dataset`.
    ///
    /// Each part is independent; a failure is logged and the rest still load.
    pub async fn load_dataset(&self, dataset: &DatasetId) -> Result<()> {
        let state = self.store.state();
        let label = state
            .datasets
            .iter()
            .find(|d| &d.id == dataset)
            .map(|d| d.label.clone())
            .unwrap_or_else(|| dataset.to_string());

        let (description, colorbar, times) = tokio::join!(
            self.api.description(dataset),
            self.api.colorbar(dataset),
            self.api.times(&label, self.config.times_limit),
        );

        match description {
            Ok(description) => {
                self.store.dispatch(Action::SetDatasetDescription {
                    dataset: dataset.clone(),
                    description,
                })?;
            }
            Err(e) => warn!(dataset = %dataset, error = %e, "No dataset description"),
        }

        match colorbar {
            Ok(colorbar) => {
                let limits = colorbar.limits();
                self.colorbars.lock().insert(dataset.clone());
                self.store.dispatch(Action::SetPalette(colorbar.palette))?;
                self.store.dispatch(Action::SetLimits(limits))?;
            }
            Err(e) => debug!(dataset = %dataset, error = %e, "No dataset palette"),
        }

        match times {
            Ok(times) => {
                info!(dataset = %dataset, label = %label, count = times.len(), "Loaded times");
                self.store.dispatch(Action::SetTimes {
                    dataset: dataset.clone(),
                    times,
                })?;
                if self.config.animation.autoplay && !self.store.state().playing {
                    self.store.dispatch(Action::SetPlaying(true))?;
                }
            }
            Err(e) => warn!(dataset = %dataset, error = %e, "Failed to load times"),
        }
        Ok(())
    }

    /// Ensure a batch of tile URLs, then derive limits from the images if needed.
    pub async fn load_tiles(&self, urls: &[String]) -> Result<()> {
        let results = self.cache.ensure_all(urls).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some tiles failed to load");
        }
        self.apply_auto_limits()
    }

    /// Set limits from the active images unless the selected dataset has a colorbar.
    fn apply_auto_limits(&self) -> Result<()> {
        let state = self.store.state();
        let Some(dataset) = state.dataset.as_ref() else {
            return Ok(());
        };
        if self.colorbars.lock().contains(dataset) {
            return Ok(());
        }
        let Some(limits) = self.cache.with_columns(ColumnStore::image_limits) else {
            return Ok(());
        };
        if state.limits != Some(limits) {
            debug!(dataset = %dataset, low = limits.low, high = limits.high, "Auto limits");
            self.store.dispatch(Action::SetLimits(limits))?;
        }
        Ok(())
    }

    /// URLs covering the viewport for the current state.
    ///
    /// Tiled variables resolve one URL per covering tile. A dataset whose description
    /// lists no variables is served as whole frames, one URL per time.
    pub fn wanted_urls(&self, state: &State) -> ViewerResult<Option<Vec<String>>> {
        let endpoints = self.api.endpoints();
        if let Some(template) = state.tile_template(endpoints) {
            return endpoint::urls(Some(&template), state.viewport.as_ref(), &self.mapper);
        }

        let frames_only = state
            .selected_dataset()
            .and_then(|d| d.description.as_ref())
            .is_some_and(|d| d.data_vars.is_empty());
        if frames_only {
            return Ok(state.frame_url(endpoints).map(|url| vec![url]));
        }
        Ok(None)
    }

    /// Subscribe the dataset, tile and title watchers.
    ///
    /// Watchers stop when the returned subscriptions are dropped.
    pub fn watch(self: &Arc<Self>, runtime: Handle) -> Vec<Subscription> {
        vec![
            self.watch_datasets(runtime.clone()),
            self.watch_tiles(runtime),
            self.watch_title(),
        ]
    }

    fn watch_datasets(self: &Arc<Self>, runtime: Handle) -> Subscription {
        let session = Arc::downgrade(self);
        let last: Mutex<Option<DatasetId>> = Mutex::new(None);

        self.store.subscribe(move |state| {
            let Some(selected) = state.dataset.clone() else {
                return;
            };
            {
                let mut last = last.lock();
                if last.as_ref() == Some(&selected) {
                    return;
                }
                *last = Some(selected.clone());
            }
            let Some(session) = session.upgrade() else {
                return;
            };

            info!(dataset = %selected, "Dataset selected");
            runtime.spawn(async move {
                if let Err(e) = session.load_dataset(&selected).await {
                    error!(dataset = %selected, error = %e, "Failed to load dataset");
                }
            });
        })
    }

    fn watch_tiles(self: &Arc<Self>, runtime: Handle) -> Subscription {
        let session = Arc::downgrade(self);
        let last: Mutex<Option<(String, Option<Viewport>)>> = Mutex::new(None);

        self.store.subscribe(move |state| {
            let Some(session) = session.upgrade() else {
                return;
            };
            let Some(template) = state
                .tile_template(session.api.endpoints())
                .or_else(|| state.frame_url(session.api.endpoints()))
            else {
                return;
            };
            {
                let key = (template, state.viewport);
                let mut last = last.lock();
                if last.as_ref() == Some(&key) {
                    return;
                }
                *last = Some(key);
            }

            let urls = match session.wanted_urls(state) {
                Ok(Some(urls)) => urls,
                Ok(None) => return,
                Err(e) if e.is_viewport_error() => {
                    debug!(error = %e, "Viewport has no tiles");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to compute tile URLs");
                    return;
                }
            };

            debug!(count = urls.len(), "Ensuring tiles");
            runtime.spawn(async move {
                if let Err(e) = session.load_tiles(&urls).await {
                    warn!(error = %e, "Failed to apply tile batch");
                }
            });
        })
    }

    fn watch_title(&self) -> Subscription {
        let last: Mutex<Option<String>> = Mutex::new(None);
        self.store.subscribe(move |state| {
            let title = state.title();
            let mut last = last.lock();
            if *last != title {
                if let Some(title) = &title {
                    info!(
                        title = %title,
                        time_index = state.time_index,
                        playing = state.playing,
                        data_var = state.data_var(),
                        "Frame"
                    );
                }
                *last = title;
            }
        })
    }
}
