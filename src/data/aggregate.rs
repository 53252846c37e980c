use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::model::{CellValue, Dataset, ORDER_DATE};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// How the values of one group are folded into a single number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// Sum of the non-null values; the value column must be numeric.
    Sum,
    /// Number of non-null values, of any type.
    Count,
}

/// Order of the aggregated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// Largest value first, ties by group. Used by bar charts.
    ValueDescending,
    /// By group identity. Used by time-series and histogram charts.
    GroupAscending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValue {
    pub group: CellValue,
    pub value: f64,
}

/// Group `view` by `group_column` and reduce `value_column` per group.
///
/// Null keys form a group of their own, so the group values always add up
/// to the reducer applied to the whole view.
pub fn aggregate_for_chart(
    view: &Dataset,
    group_column: &str,
    value_column: &str,
    reducer: Reducer,
    order: GroupOrder,
) -> Result<Vec<GroupValue>> {
    let group_idx = view.column_index(group_column)?;
    let value_idx = match reducer {
        Reducer::Sum => view.numeric_column_index(value_column)?,
        Reducer::Count => view.column_index(value_column)?,
    };

    let mut groups: BTreeMap<&CellValue, f64> = BTreeMap::new();
    for record in view.records() {
        let value = record.get(value_idx);
        let contribution = match reducer {
            Reducer::Sum => value.as_f64().unwrap_or(0.0),
            Reducer::Count => {
                if value.is_null() {
                    0.0
                } else {
                    1.0
                }
            }
        };
        *groups.entry(record.get(group_idx)).or_insert(0.0) += contribution;
    }

    let mut series: Vec<GroupValue> = groups
        .into_iter()
        .map(|(group, value)| GroupValue {
            group: group.clone(),
            value,
        })
        .collect();

    // BTreeMap iteration is already in group order; the sort is stable.
    if order == GroupOrder::ValueDescending {
        series.sort_by(|a, b| b.value.total_cmp(&a.value));
    }
    Ok(series)
}

// ---------------------------------------------------------------------------
// Monthly series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyValue {
    /// Month of the year, 1-12.
    pub month: u32,
    pub month_name: &'static str,
    pub series: CellValue,
    pub value: f64,
}

/// Sum `value_column` per calendar month of `OrderDate` and per value of
/// `series_column`. Months of different years share a bucket; rows with a
/// null date are skipped.
pub fn aggregate_by_month(
    view: &Dataset,
    value_column: &str,
    series_column: &str,
) -> Result<Vec<MonthlyValue>> {
    let date_idx = view.column_index(ORDER_DATE)?;
    let value_idx = view.numeric_column_index(value_column)?;
    let series_idx = view.column_index(series_column)?;

    let mut buckets: BTreeMap<(u32, &CellValue), f64> = BTreeMap::new();
    for record in view.records() {
        let Some(date) = record.get(date_idx).as_date() else {
            continue;
        };
        let value = record.get(value_idx).as_f64().unwrap_or(0.0);
        *buckets
            .entry((date.month(), record.get(series_idx)))
            .or_insert(0.0) += value;
    }

    Ok(buckets
        .into_iter()
        .map(|((month, series), value)| MonthlyValue {
            month,
            month_name: MONTH_NAMES[(month - 1) as usize],
            series: series.clone(),
            value,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Scatter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: CellValue,
    pub y: f64,
    pub color: CellValue,
}

/// One point per row with a non-null `y`; `y_column` must be numeric.
pub fn scatter_points(
    view: &Dataset,
    x_column: &str,
    y_column: &str,
    color_column: &str,
) -> Result<Vec<ScatterPoint>> {
    let x_idx = view.column_index(x_column)?;
    let y_idx = view.numeric_column_index(y_column)?;
    let color_idx = view.column_index(color_column)?;

    Ok(view
        .records()
        .iter()
        .filter_map(|r| {
            r.get(y_idx).as_f64().map(|y| ScatterPoint {
                x: r.get(x_idx).clone(),
                y,
                color: r.get(color_idx).clone(),
            })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Histogram {
    /// Occurrences of each distinct non-null value, in value order.
    Categorical { counts: Vec<GroupValue> },
    /// Equal-width bins over `[min, max]`; the last bin includes `max`.
    Numeric { bins: Vec<Bin> },
}

pub fn histogram(view: &Dataset, column: &str, bins: usize) -> Result<Histogram> {
    let kind = view.column(column)?.kind;
    if !kind.is_numeric() {
        let counts = aggregate_for_chart(view, column, column, Reducer::Count, GroupOrder::GroupAscending)?
            .into_iter()
            .filter(|g| !g.group.is_null())
            .collect();
        return Ok(Histogram::Categorical { counts });
    }

    if bins == 0 {
        return Err(Error::InvalidConfig("histogram needs at least one bin".to_string()));
    }
    let Some((min, max)) = view.numeric_bounds(column)? else {
        return Ok(Histogram::Numeric { bins: Vec::new() });
    };
    let values = view.values(column)?.filter_map(CellValue::as_f64);

    if min == max {
        return Ok(Histogram::Numeric {
            bins: vec![Bin {
                lower: min,
                upper: max,
                count: values.count(),
            }],
        });
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();
    for v in values {
        let slot = (((v - min) / width) as usize).min(bins - 1);
        out[slot].count += 1;
    }
    Ok(Histogram::Numeric { bins: out })
}
