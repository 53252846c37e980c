use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::DashboardConfig;
use crate::data::filter::{ColumnPredicate, FilterState};
use crate::data::model::{CellValue, Dataset, DateRange};
use crate::data::{Error, Result};
use crate::report::{build_report, DashboardReport};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full dashboard state, independent of rendering.
///
/// The loaded dataset is kept for as long as the state lives, so repeated
/// interactions only re-run the filter pipeline, never the loader.
pub struct AppState {
    pub config: DashboardConfig,

    /// Loaded dataset (None until [`AppState::load`] or `set_dataset`).
    pub dataset: Option<Dataset>,

    /// Earliest and latest order date of the loaded dataset.
    pub bounds: Option<DateRange>,

    /// Active date filter, always within `bounds`.
    pub date_range: Option<DateRange>,

    /// Per-column filter predicates.
    pub filters: FilterState,

    /// Status / error message for the presentation layer.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            filters: config.filters.clone(),
            config,
            dataset: None,
            bounds: None,
            date_range: None,
            status_message: None,
        }
    }

    /// Load the configured source and ingest it.
    pub fn load(&mut self) -> Result<()> {
        let result = self
            .config
            .load_dataset()
            .and_then(|dataset| self.set_dataset(dataset));
        self.record(result)
    }

    /// Ingest a newly loaded dataset and initialise the date range from the
    /// configuration, clamped to the dataset's own bounds.
    pub fn set_dataset(&mut self, dataset: Dataset) -> Result<()> {
        let bounds = dataset.date_bounds()?;
        let clamp = |d: NaiveDate| d.clamp(bounds.start(), bounds.end());
        let start = clamp(self.config.start.unwrap_or(bounds.start()));
        let end = clamp(self.config.end.unwrap_or(bounds.end()));

        self.date_range = Some(DateRange::new(start, end)?);
        self.bounds = Some(bounds);
        self.filters = self.config.filters.clone();
        self.status_message = Some(format!(
            "{} loaded: {} rows",
            self.config.source.label(),
            dataset.len()
        ));
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Change the date filter. The range is clamped to the dataset bounds.
    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> Result<()> {
        let bounds = self.bounds.ok_or(Error::NoDataset)?;
        let range = DateRange::new(start, end)?;
        self.date_range = Some(range.clamp_to(&bounds));
        Ok(())
    }

    pub fn set_predicate(&mut self, column: &str, predicate: ColumnPredicate) {
        self.filters.insert(column.to_string(), predicate);
    }

    pub fn clear_predicate(&mut self, column: &str) {
        self.filters.remove(column);
    }

    /// Toggle a single value in a column's multi-select filter. A column
    /// without a selection yet starts from "everything selected".
    pub fn toggle_filter_value(&mut self, column: &str, value: &CellValue) -> Result<()> {
        let mut selected = match self.filters.get(column) {
            Some(ColumnPredicate::OneOf(selected)) => selected.clone(),
            _ => self.all_values(column)?,
        };
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.set_predicate(column, ColumnPredicate::OneOf(selected));
        Ok(())
    }

    /// Select all values in a column.
    pub fn select_all(&mut self, column: &str) -> Result<()> {
        let all = self.all_values(column)?;
        self.set_predicate(column, ColumnPredicate::OneOf(all));
        Ok(())
    }

    /// Deselect all values in a column.
    pub fn select_none(&mut self, column: &str) {
        self.set_predicate(column, ColumnPredicate::OneOf(BTreeSet::new()));
    }

    /// Re-run the pipeline over the current selections.
    pub fn refresh(&mut self) -> Result<DashboardReport> {
        let result = match (&self.dataset, &self.date_range) {
            (Some(dataset), Some(range)) => {
                build_report(dataset, range, &self.filters, &self.config)
            }
            _ => Err(Error::NoDataset),
        };
        let report = self.record(result)?;
        self.status_message = None;
        Ok(report)
    }

    fn all_values(&self, column: &str) -> Result<BTreeSet<CellValue>> {
        self.dataset
            .as_ref()
            .ok_or(Error::NoDataset)?
            .unique_values(column)
    }

    /// Keep the message of a failure for display, then pass the result on.
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            log::warn!("{e}");
            self.status_message = Some(e.to_string());
        }
        result
    }
}
