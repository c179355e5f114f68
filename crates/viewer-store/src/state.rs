//! Viewer state snapshot, its reducer, and derived selectors.

use std::collections::BTreeSet;

use viewer_common::{
    Dataset, DatasetId, Endpoints, Limits, PaletteEntry, SelectedPalette, Timestamp, Viewport,
};

use crate::action::Action;

/// Tooltip entry shown for every variable before its own attributes.
pub const VALUE_TOOLTIP: (&str, &str) = ("Value", "@image @units");

/// Last failed fetch, kept for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub url: String,
    pub message: String,
}

/// Immutable snapshot of the viewer.
///
/// Replaced wholesale on each dispatch; an action only touches the fields it names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    // Datasets
    pub datasets: Vec<Dataset>,
    pub dataset: Option<DatasetId>,
    pub data_var: Option<String>,

    // Map
    pub viewport: Option<Viewport>,

    // Palettes
    pub palettes: Option<Vec<PaletteEntry>>,
    pub palette_names: Vec<String>,
    pub palette_name: Option<String>,
    pub palette_number: Option<u32>,
    pub palette_numbers: Vec<u32>,
    pub palette: Option<Vec<String>>,
    pub limits: Option<Limits>,

    // Animation
    pub times: Option<Vec<Timestamp>>,
    pub times_dataset: Option<DatasetId>,
    pub time_index: Option<usize>,
    pub playing: bool,

    // Fetching
    pub in_flight: BTreeSet<String>,
    pub last_fetch_error: Option<FetchFailure>,
}

impl State {
    /// True while any request is outstanding.
    pub fn is_fetching(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Times loaded for the selected dataset, if any.
    pub fn selected_times(&self) -> Option<&[Timestamp]> {
        match (&self.times, &self.times_dataset, &self.dataset) {
            (Some(times), Some(owner), Some(selected)) if owner == selected => {
                Some(times.as_slice())
            }
            _ => None,
        }
    }

    pub fn current_time(&self) -> Option<Timestamp> {
        let times = self.selected_times()?;
        times.get(self.time_index?).copied()
    }

    pub fn selected_dataset(&self) -> Option<&Dataset> {
        let id = self.dataset.as_ref()?;
        self.datasets.iter().find(|d| &d.id == id)
    }

    /// Explicitly chosen variable, else the first variable of the dataset description.
    pub fn data_var(&self) -> Option<&str> {
        if let Some(var) = self.data_var.as_deref() {
            return Some(var);
        }
        self.selected_dataset()?
            .description
            .as_ref()?
            .default_var()
    }

    /// Colors combined with limits; needs both.
    pub fn selected_palette(&self) -> Option<SelectedPalette> {
        let colors = self.palette.as_ref()?;
        let limits = self.limits?;
        Some(SelectedPalette {
            low: limits.low,
            high: limits.high,
            colors: colors.clone(),
        })
    }

    /// Tile URL template for the current dataset, variable and time.
    pub fn tile_template(&self, endpoints: &Endpoints) -> Option<String> {
        let dataset = self.dataset.as_ref()?;
        endpoints.tile_template(dataset, self.data_var(), self.current_time())
    }

    /// Whole-frame URL for datasets served without tiles.
    pub fn frame_url(&self, endpoints: &Endpoints) -> Option<String> {
        let dataset = self.dataset.as_ref()?;
        Some(endpoints.frame(dataset, self.current_time()?))
    }

    /// Hover entries for the current variable.
    pub fn tooltips(&self) -> Vec<(String, String)> {
        let mut items = vec![(VALUE_TOOLTIP.0.to_string(), VALUE_TOOLTIP.1.to_string())];
        let attrs = self.data_var().and_then(|var| {
            self.selected_dataset()?
                .description
                .as_ref()?
                .data_vars
                .get(var)
        });
        if let Some(var) = attrs {
            items.extend(var.attrs.iter().cloned());
        }
        items
    }

    /// Current time as a UTC string.
    pub fn title(&self) -> Option<String> {
        self.current_time().map(|t| t.to_utc_string())
    }
}

/// Apply one action. Pure: the same inputs always produce the same snapshot.
pub fn reduce(state: &State, action: &Action) -> State {
    let mut next = state.clone();
    match action {
        Action::SetDatasets(datasets) => {
            next.datasets = datasets.clone();
        }
        Action::SetDataset(id) => {
            if next.dataset.as_ref() != Some(id) {
                next.data_var = None;
            }
            next.dataset = Some(id.clone());
        }
        Action::SetDatasetDescription {
            dataset,
            description,
        } => {
            if let Some(entry) = next.datasets.iter_mut().find(|d| &d.id == dataset) {
                entry.description = Some(description.clone());
            }
        }
        Action::SetDataVar(var) => {
            next.data_var = Some(var.clone());
        }
        Action::SetViewport(viewport) => {
            next.viewport = Some(*viewport);
        }
        Action::SetPalettes(catalog) => {
            next.palettes = Some(catalog.clone());
        }
        Action::SetPaletteNames(names) => {
            next.palette_names = names.clone();
        }
        Action::SetPaletteName(name) => {
            next.palette_name = Some(name.clone());
        }
        Action::SetPaletteNumber(number) => {
            next.palette_number = Some(*number);
        }
        Action::SetPaletteNumbers(numbers) => {
            next.palette_numbers = numbers.clone();
        }
        Action::SetPalette(colors) => {
            next.palette = Some(colors.clone());
        }
        Action::SetLimits(limits) => {
            next.limits = Some(*limits);
        }
        Action::SetPlaying(playing) => {
            next.playing = *playing;
        }
        Action::SetTimes { dataset, times } => {
            next.time_index = next.time_index.filter(|i| *i < times.len());
            next.times = Some(times.clone());
            next.times_dataset = Some(dataset.clone());
        }
        Action::SetTimeIndex(index) => {
            next.time_index = match next.times.as_ref().map(Vec::len) {
                Some(len) if len > 0 => Some(index % len),
                _ => None,
            };
        }
        // Resolved into SET_TIME_INDEX by the animation middleware
        Action::AdvanceTime | Action::RetreatTime => {}
        Action::FetchStarted(url) => {
            next.in_flight.insert(url.clone());
        }
        Action::FetchSucceeded(url) => {
            next.in_flight.remove(url);
        }
        Action::FetchFailed { url, message } => {
            next.in_flight.remove(url);
            next.last_fetch_error = Some(FetchFailure {
                url: url.clone(),
                message: message.clone(),
            });
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_common::{DataVar, DatasetDescription};

    fn times(n: i64) -> Vec<Timestamp> {
        (0..n).map(|i| Timestamp(i * 1000)).collect()
    }

    fn with_times(n: i64) -> State {
        let mut state = State::default();
        state.dataset = Some(DatasetId::new("0"));
        state = reduce(
            &state,
            &Action::SetTimes {
                dataset: DatasetId::new("0"),
                times: times(n),
            },
        );
        state
    }

    #[test]
    fn test_reduce_is_pure() {
        let state = with_times(3);
        let action = Action::SetTimeIndex(2);
        let first = reduce(&state, &action);
        let second = reduce(&state, &action);
        assert_eq!(first, second);
        assert_eq!(state.time_index, None);
    }

    #[test]
    fn test_reduce_leaves_unrelated_fields() {
        let mut state = with_times(3);
        state.playing = true;
        state.limits = Some(Limits::new(0.0, 1.0));
        let next = reduce(&state, &Action::SetPaletteName("Viridis".into()));
        assert_eq!(next.palette_name.as_deref(), Some("Viridis"));
        assert!(next.playing);
        assert_eq!(next.limits, state.limits);
        assert_eq!(next.times, state.times);
    }

    #[test]
    fn test_time_index_wraps_into_range() {
        let state = reduce(&with_times(3), &Action::SetTimeIndex(4));
        assert_eq!(state.time_index, Some(1));
    }

    #[test]
    fn test_time_index_absent_without_times() {
        let state = reduce(&State::default(), &Action::SetTimeIndex(0));
        assert_eq!(state.time_index, None);
    }

    #[test]
    fn test_set_times_drops_out_of_range_index() {
        let state = reduce(&with_times(5), &Action::SetTimeIndex(4));
        let next = reduce(
            &state,
            &Action::SetTimes {
                dataset: DatasetId::new("0"),
                times: times(2),
            },
        );
        assert_eq!(next.time_index, None);
    }

    #[test]
    fn test_advance_is_a_no_op_in_reducer() {
        let state = reduce(&with_times(3), &Action::SetTimeIndex(1));
        assert_eq!(reduce(&state, &Action::AdvanceTime), state);
        assert_eq!(reduce(&state, &Action::RetreatTime), state);
    }

    #[test]
    fn test_fetch_lifecycle_tracks_in_flight() {
        let state = reduce(&State::default(), &Action::FetchStarted("a".into()));
        assert!(state.is_fetching());
        let state = reduce(&state, &Action::FetchStarted("b".into()));
        let state = reduce(&state, &Action::FetchSucceeded("a".into()));
        assert!(state.is_fetching());
        let state = reduce(
            &state,
            &Action::FetchFailed {
                url: "b".into(),
                message: "HTTP 500".into(),
            },
        );
        assert!(!state.is_fetching());
        assert_eq!(state.last_fetch_error.unwrap().url, "b");
    }

    #[test]
    fn test_selected_palette_needs_limits() {
        let state = reduce(&State::default(), &Action::SetPalette(vec!["#000".into()]));
        assert!(state.selected_palette().is_none());

        let state = reduce(&state, &Action::SetLimits(Limits::new(200.0, 300.0)));
        let palette = state.selected_palette().unwrap();
        assert_eq!(palette.low, 200.0);
        assert_eq!(palette.colors, vec!["#000".to_string()]);
    }

    #[test]
    fn test_current_time_scoped_to_selected_dataset() {
        let state = reduce(&with_times(3), &Action::SetTimeIndex(2));
        assert_eq!(state.current_time(), Some(Timestamp(2000)));

        let switched = reduce(&state, &Action::SetDataset(DatasetId::new("1")));
        assert_eq!(switched.current_time(), None);
        assert!(switched.title().is_none());
    }

    #[test]
    fn test_tile_template_uses_description_default_var() {
        let mut description = DatasetDescription::default();
        description
            .data_vars
            .insert("air_temperature".into(), DataVar::default());

        let mut state = reduce(
            &State::default(),
            &Action::SetDatasets(vec![Dataset::new("0", "EIDA50")]),
        );
        state.dataset = Some(DatasetId::new("0"));
        let state = reduce(
            &state,
            &Action::SetDatasetDescription {
                dataset: DatasetId::new("0"),
                description,
            },
        );
        let state = reduce(
            &state,
            &Action::SetTimes {
                dataset: DatasetId::new("0"),
                times: times(1),
            },
        );
        let state = reduce(&state, &Action::SetTimeIndex(0));

        let endpoints = Endpoints::new("http://host");
        assert_eq!(
            state.tile_template(&endpoints).unwrap(),
            "http://host/datasets/0/air_temperature/times/0/tiles/{Z}/{X}/{Y}"
        );
    }

    #[test]
    fn test_tooltips_append_variable_attrs() {
        let mut description = DatasetDescription::default();
        description.data_vars.insert(
            "rain".into(),
            DataVar {
                attrs: vec![("units".into(), "mm".into())],
            },
        );
        let mut dataset = Dataset::new("0", "Rain");
        dataset.description = Some(description);

        let mut state = State::default();
        state.datasets = vec![dataset];
        state.dataset = Some(DatasetId::new("0"));

        assert_eq!(
            state.tooltips(),
            vec![
                ("Value".to_string(), "@image @units".to_string()),
                ("units".to_string(), "mm".to_string()),
            ]
        );
        assert_eq!(State::default().tooltips().len(), 1);
    }
}
