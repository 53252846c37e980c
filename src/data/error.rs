use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Everything that can stop the pipeline for the current request.
#[derive(Debug, Error)]
pub enum Error {
    // -- load --
    #[error("failed to open {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("malformed CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset is missing required column \"{0}\"")]
    MissingColumn(String),

    // -- format --
    #[error("unsupported file type \"{0}\": please upload a CSV file")]
    UnsupportedFileType(String),

    // -- parse --
    #[error("row {row}: cannot parse \"{value}\" in column {column} as a date")]
    InvalidDate {
        row: usize,
        column: String,
        value: String,
    },

    // -- filtering / metrics --
    #[error("no data available for the selected filters")]
    EmptyResult,
    #[error("cannot compute metrics over column \"{0}\": the view has no values")]
    EmptyView(String),
    #[error("unknown column \"{0}\"")]
    UnknownColumn(String),
    #[error("column \"{0}\" is not numeric")]
    NotNumeric(String),
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("column \"{0}\" contains no valid dates")]
    NoDates(String),

    #[error("no dataset loaded: please choose or upload a dataset to proceed")]
    NoDataset,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
