//! The viewer's middleware stages.

use tracing::{debug, trace};
use viewer_common::palette;

use crate::action::Action;
use crate::error::StoreResult;
use crate::pipeline::{Chain, Middleware};

/// Euclidean remainder of `value` by `len`, always in `[0, len)`.
///
/// Returns 0 for an empty series.
pub fn wrap(value: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    value.rem_euclid(len as i64) as usize
}

/// Emits one debug event per action.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn handle(&self, action: Action, chain: &mut Chain<'_>) -> StoreResult<()> {
        debug!(action = action.kind(), depth = chain.depth(), "Dispatch");
        trace!(payload = ?action, "Action payload");
        chain.forward(action)
    }
}

/// Slot for UI tool modes. Carries no behavior of its own.
pub struct ToolMiddleware;

impl Middleware for ToolMiddleware {
    fn name(&self) -> &'static str {
        "tool"
    }

    fn handle(&self, action: Action, chain: &mut Chain<'_>) -> StoreResult<()> {
        chain.forward(action)
    }
}

/// Turns ADVANCE_TIME and RETREAT_TIME into a wrapped SET_TIME_INDEX.
pub struct AnimationMiddleware;

impl Middleware for AnimationMiddleware {
    fn name(&self) -> &'static str {
        "animation"
    }

    fn handle(&self, action: Action, chain: &mut Chain<'_>) -> StoreResult<()> {
        let step = match action {
            Action::AdvanceTime => 1,
            Action::RetreatTime => -1,
            other => return chain.forward(other),
        };

        let state = chain.state();
        let (Some(times), Some(index)) = (state.selected_times(), state.time_index) else {
            return Ok(());
        };
        if times.is_empty() {
            return Ok(());
        }

        let next = wrap(index as i64 + step, times.len());
        chain.forward(Action::SetTimeIndex(next))
    }
}

/// Derives palette names, numbers and colors from the catalog.
pub struct PaletteMiddleware;

impl Middleware for PaletteMiddleware {
    fn name(&self) -> &'static str {
        "palette"
    }

    fn handle(&self, action: Action, chain: &mut Chain<'_>) -> StoreResult<()> {
        match action {
            Action::SetPalettes(catalog) => {
                let names = palette::palette_names(&catalog);
                chain.forward(Action::SetPalettes(catalog))?;
                chain.dispatch(Action::SetPaletteNames(names))
            }
            Action::SetPaletteName(name) => {
                chain.forward(Action::SetPaletteName(name.clone()))?;
                let numbers = match chain.state().palettes.as_ref() {
                    Some(catalog) => palette::palette_numbers(catalog, &name),
                    None => return Ok(()),
                };
                chain.dispatch(Action::SetPaletteNumbers(numbers))
            }
            Action::SetPaletteNumber(number) => {
                chain.forward(Action::SetPaletteNumber(number))?;
                let state = chain.state();
                let colors = match (state.palettes.as_ref(), state.palette_name.as_ref()) {
                    (Some(catalog), Some(name)) => {
                        palette::find_palette(catalog, name, number).map(|p| p.colors.clone())
                    }
                    _ => None,
                };
                match colors {
                    Some(colors) => chain.dispatch(Action::SetPalette(colors)),
                    None => Ok(()),
                }
            }
            other => chain.forward(other),
        }
    }
}

/// Selects the first dataset once the list arrives.
pub struct DatasetsMiddleware;

impl Middleware for DatasetsMiddleware {
    fn name(&self) -> &'static str {
        "datasets"
    }

    fn handle(&self, action: Action, chain: &mut Chain<'_>) -> StoreResult<()> {
        let Action::SetDatasets(datasets) = action else {
            return chain.forward(action);
        };

        let first = datasets.first().map(|d| d.id.clone());
        chain.forward(Action::SetDatasets(datasets))?;
        match first {
            Some(id) if chain.state().dataset.is_none() => chain.dispatch(Action::SetDataset(id)),
            _ => Ok(()),
        }
    }
}

/// Keeps the time series scoped to the selected dataset.
pub struct TimeMiddleware;

impl Middleware for TimeMiddleware {
    fn name(&self) -> &'static str {
        "time"
    }

    fn handle(&self, action: Action, chain: &mut Chain<'_>) -> StoreResult<()> {
        match action {
            Action::SetTimes { dataset, times } => {
                if chain.state().dataset.as_ref() != Some(&dataset) {
                    debug!(dataset = %dataset, "Dropping times for unselected dataset");
                    return Ok(());
                }
                chain.forward(Action::SetTimes { dataset, times })?;

                let state = chain.state();
                let len = state.times.as_ref().map_or(0, Vec::len);
                let in_range = state.time_index.is_some_and(|i| i < len);
                if len > 0 && !in_range {
                    chain.dispatch(Action::SetTimeIndex(0))?;
                }
                Ok(())
            }
            Action::SetDataset(id) => {
                let changed = chain.state().dataset.as_ref() != Some(&id);
                chain.forward(Action::SetDataset(id))?;
                if changed && chain.state().playing {
                    chain.dispatch(Action::SetPlaying(false))?;
                }
                Ok(())
            }
            other => chain.forward(other),
        }
    }
}
