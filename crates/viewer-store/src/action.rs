//! The closed set of state changes.

use viewer_common::{
    Dataset, DatasetDescription, DatasetId, Limits, PaletteEntry, Timestamp, Viewport,
};

/// A single state change request.
///
/// Actions are the only externally visible unit of change; the reducer matches on them
/// exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // === Datasets ===
    SetDatasets(Vec<Dataset>),
    SetDataset(DatasetId),
    SetDatasetDescription {
        dataset: DatasetId,
        description: DatasetDescription,
    },
    SetDataVar(String),

    // === Map ===
    SetViewport(Viewport),

    // === Palettes ===
    SetPalettes(Vec<PaletteEntry>),
    SetPaletteNames(Vec<String>),
    SetPaletteName(String),
    SetPaletteNumber(u32),
    SetPaletteNumbers(Vec<u32>),
    SetPalette(Vec<String>),
    SetLimits(Limits),

    // === Animation ===
    SetPlaying(bool),
    SetTimes {
        dataset: DatasetId,
        times: Vec<Timestamp>,
    },
    SetTimeIndex(usize),
    AdvanceTime,
    RetreatTime,

    // === Fetching ===
    FetchStarted(String),
    FetchSucceeded(String),
    FetchFailed { url: String, message: String },
}

impl Action {
    /// Wire-style name, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SetDatasets(_) => "SET_DATASETS",
            Action::SetDataset(_) => "SET_DATASET",
            Action::SetDatasetDescription { .. } => "SET_DATASET_DESCRIPTION",
            Action::SetDataVar(_) => "SET_DATA_VAR",
            Action::SetViewport(_) => "SET_VIEWPORT",
            Action::SetPalettes(_) => "SET_PALETTES",
            Action::SetPaletteNames(_) => "SET_PALETTE_NAMES",
            Action::SetPaletteName(_) => "SET_PALETTE_NAME",
            Action::SetPaletteNumber(_) => "SET_PALETTE_NUMBER",
            Action::SetPaletteNumbers(_) => "SET_PALETTE_NUMBERS",
            Action::SetPalette(_) => "SET_PALETTE",
            Action::SetLimits(_) => "SET_LIMITS",
            Action::SetPlaying(_) => "SET_PLAYING",
            Action::SetTimes { .. } => "SET_TIMES",
            Action::SetTimeIndex(_) => "SET_TIME_INDEX",
            Action::AdvanceTime => "ADVANCE_TIME",
            Action::RetreatTime => "RETREAT_TIME",
            Action::FetchStarted(_) => "FETCH_STARTED",
            Action::FetchSucceeded(_) => "FETCH_SUCCEEDED",
            Action::FetchFailed { .. } => "FETCH_FAILED",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}
