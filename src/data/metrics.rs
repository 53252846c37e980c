use serde::Serialize;

use super::error::{Error, Result};
use super::model::Dataset;

/// Summary scalars for one numeric column of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSet {
    pub column: String,
    /// Number of non-null values the other fields were computed over.
    pub count: usize,
    pub sum: f64,
    pub max: f64,
    pub min: f64,
    /// `max - min`.
    pub range: f64,
}

/// Count, sum, max, min and spread of `column` over `view`, ignoring nulls.
///
/// Sum, max and min have no meaning without values, so a view with no rows
/// (or only nulls in `column`) is reported as [`Error::EmptyView`] rather
/// than with made-up zeros. Use [`count_non_null`] when only the count is
/// needed; it is simply 0 for an empty view.
pub fn compute_metrics(view: &Dataset, column: &str) -> Result<MetricSet> {
    let idx = view.numeric_column_index(column)?;

    let mut values = view.records().iter().filter_map(|r| r.get(idx).as_f64());
    let first = values
        .next()
        .ok_or_else(|| Error::EmptyView(column.to_string()))?;

    let (count, sum, min, max) = values.fold((1usize, first, first, first), |(n, s, lo, hi), v| {
        (n + 1, s + v, lo.min(v), hi.max(v))
    });

    Ok(MetricSet {
        column: column.to_string(),
        count,
        sum,
        max,
        min,
        range: max - min,
    })
}

/// Number of rows with a value in `column`, of any type.
pub fn count_non_null(view: &Dataset, column: &str) -> Result<usize> {
    Ok(view.values(column)?.filter(|v| !v.is_null()).count())
}
