use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::loader::parse_date;
use super::model::{CellValue, ColumnKind, Dataset, DateRange, Record, ORDER_DATE};

// ---------------------------------------------------------------------------
// Column predicates
// ---------------------------------------------------------------------------

/// A constraint on the values of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPredicate {
    /// Multi-select membership. An empty set matches nothing; a null cell
    /// matches only when `Null` itself is selected.
    OneOf(BTreeSet<CellValue>),
    /// Inclusive numeric range. Nulls never match.
    Between { min: f64, max: f64 },
    /// Case-insensitive substring match on text.
    Contains(String),
    /// Inclusive date range.
    DateWithin(DateRange),
}

impl ColumnPredicate {
    fn check_kind(&self, column: &str, kind: ColumnKind) -> Result<()> {
        match self {
            ColumnPredicate::Between { .. } if !kind.is_numeric() => {
                Err(Error::NotNumeric(column.to_string()))
            }
            ColumnPredicate::Contains(_) if kind != ColumnKind::Text => Err(Error::InvalidConfig(
                format!("text search needs a text column, but \"{column}\" is {kind:?}"),
            )),
            ColumnPredicate::DateWithin(_) if kind != ColumnKind::Date => Err(Error::InvalidConfig(
                format!("date filter needs a date column, but \"{column}\" is {kind:?}"),
            )),
            _ => Ok(()),
        }
    }

    /// The predicate with every selected value converted to `kind`, so a
    /// selection written as `10` or `"10"` finds the float cell `10.0`.
    fn for_kind(&self, kind: ColumnKind) -> ColumnPredicate {
        match self {
            ColumnPredicate::OneOf(selected) => ColumnPredicate::OneOf(
                selected.iter().map(|v| convert_to_kind(v, kind)).collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn matches(&self, value: &CellValue) -> bool {
        match self {
            ColumnPredicate::OneOf(selected) => selected.contains(value),
            ColumnPredicate::Between { min, max } => value
                .as_f64()
                .map_or(false, |v| *min <= v && v <= *max),
            ColumnPredicate::Contains(needle) => match value {
                CellValue::Text(s) => s.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
            ColumnPredicate::DateWithin(range) => value.as_date().map_or(false, |d| range.contains(d)),
        }
    }
}

/// Convert a selected value to the storage kind of the column it filters.
/// Values that have no sensible conversion are returned unchanged.
fn convert_to_kind(value: &CellValue, kind: ColumnKind) -> CellValue {
    match (value, kind) {
        (CellValue::Integer(i), ColumnKind::Float) => CellValue::Float(*i as f64),
        (CellValue::Float(v), ColumnKind::Integer) if v.fract() == 0.0 => {
            CellValue::Integer(*v as i64)
        }
        (CellValue::Integer(i), ColumnKind::Text) => CellValue::Text(i.to_string()),
        (CellValue::Float(v), ColumnKind::Text) => CellValue::Text(v.to_string()),
        (CellValue::Text(s), ColumnKind::Integer) => s
            .trim()
            .parse()
            .map(CellValue::Integer)
            .unwrap_or_else(|_| value.clone()),
        (CellValue::Text(s), ColumnKind::Float) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Float(v),
            _ => value.clone(),
        },
        (CellValue::Text(s), ColumnKind::Date) => parse_date(s.trim())
            .map(CellValue::Date)
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}

// ---------------------------------------------------------------------------
// Filter state: the active predicate per column
// ---------------------------------------------------------------------------

/// Per-column predicates combined by conjunction. Keyed by column name, so
/// the order in which they were added never affects the result.
pub type FilterState = BTreeMap<String, ColumnPredicate>;

/// Initialise a [`FilterState`] that lets every row through: all values
/// selected for text columns, the full `[min, max]` range for numeric ones.
/// Numeric columns holding nulls get no range, since a range drops nulls.
pub fn init_filter_state(dataset: &Dataset) -> Result<FilterState> {
    let mut state = FilterState::new();
    for column in dataset.columns() {
        if column.kind.is_categorical() {
            let values = dataset.unique_values(&column.name)?;
            state.insert(column.name.clone(), ColumnPredicate::OneOf(values));
        } else if column.kind.is_numeric() {
            let has_nulls = dataset.values(&column.name)?.any(CellValue::is_null);
            if has_nulls {
                continue;
            }
            if let Some((min, max)) = dataset.numeric_bounds(&column.name)? {
                state.insert(column.name.clone(), ColumnPredicate::Between { min, max });
            }
        }
    }
    Ok(state)
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Rows whose `OrderDate` lies in `range`, both ends inclusive.
///
/// Rows with a null date never match. An empty result is returned as an
/// empty dataset, not an error; see [`ensure_non_empty`].
pub fn filter_by_date_range(dataset: &Dataset, range: &DateRange) -> Result<Dataset> {
    let idx = dataset.column_index(ORDER_DATE)?;
    let view = dataset.retain_rows(|r| r.get(idx).as_date().map_or(false, |d| range.contains(d)));
    log::debug!("date range {range}: {} of {} rows", view.len(), dataset.len());
    Ok(view)
}

/// Rows that satisfy every predicate in `filters`.
///
/// A row missing a value is treated as `Null` for that column. Selected
/// values are compared after conversion to the column's kind.
pub fn filter_by_column_predicates(dataset: &Dataset, filters: &FilterState) -> Result<Dataset> {
    let mut resolved: Vec<(usize, ColumnPredicate)> = Vec::with_capacity(filters.len());
    for (col, predicate) in filters {
        let idx = dataset.column_index(col)?;
        let kind = dataset.columns()[idx].kind;
        predicate.check_kind(col, kind)?;
        resolved.push((idx, predicate.for_kind(kind)));
    }

    let view = dataset.retain_rows(|r: &Record| {
        resolved
            .iter()
            .all(|(idx, predicate)| predicate.matches(r.get(*idx)))
    });
    log::debug!(
        "{} column filter(s): {} of {} rows",
        filters.len(),
        view.len(),
        dataset.len()
    );
    Ok(view)
}

/// Turn an empty view into [`Error::EmptyResult`] so the caller stops there.
pub fn ensure_non_empty(view: Dataset) -> Result<Dataset> {
    if view.is_empty() {
        log::warn!("no rows match the current filters");
        return Err(Error::EmptyResult);
    }
    Ok(view)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::model::{Column, CATEGORY, PRODUCT, QUANTITY, UNIT_PRICE};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(a: NaiveDate, b: NaiveDate) -> DateRange {
        DateRange::new(a, b).unwrap()
    }

    fn row(d: Option<NaiveDate>, product: &str, category: &str, qty: i64) -> Record {
        Record::new(vec![
            d.map_or(CellValue::Null, CellValue::Date),
            product.into(),
            category.into(),
            qty.into(),
        ])
    }

    fn sample() -> Dataset {
        Dataset::new(
            vec![
                Column::new(ORDER_DATE, ColumnKind::Date),
                Column::new(PRODUCT, ColumnKind::Text),
                Column::new(CATEGORY, ColumnKind::Text),
                Column::new(QUANTITY, ColumnKind::Integer),
            ],
            vec![
                row(Some(date(2024, 1, 1)), "Widget", "Tools", 10),
                row(Some(date(2024, 1, 20)), "Gadget", "Toys", 5),
                row(None, "Widget", "Tools", 8),
                row(Some(date(2024, 2, 1)), "Gizmo", "Tools", 2),
                row(Some(date(2024, 3, 10)), "Gadget", "Toys", 12),
            ],
        )
    }

    fn products(ds: &Dataset) -> Vec<String> {
        ds.values(PRODUCT).unwrap().map(|v| v.to_string()).collect()
    }

    #[test]
    fn date_range_is_inclusive_on_both_ends() {
        let ds = sample();
        let view = filter_by_date_range(&ds, &range(date(2024, 1, 1), date(2024, 2, 1))).unwrap();
        assert_eq!(products(&view), vec!["Widget", "Gadget", "Gizmo"]);
    }

    #[test]
    fn date_range_with_no_match_is_empty_not_error() {
        let ds = sample();
        let view = filter_by_date_range(&ds, &range(date(2023, 1, 1), date(2023, 12, 31))).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.columns(), ds.columns());
        assert!(matches!(ensure_non_empty(view), Err(Error::EmptyResult)));
    }

    #[test]
    fn narrowing_the_range_never_adds_rows() {
        let ds = sample();
        let bounds = ds.date_bounds().unwrap();
        let mut last = usize::MAX;
        let mut start = bounds.start();
        while start <= bounds.end() {
            let r = range(start, bounds.end());
            let view = filter_by_date_range(&ds, &r).unwrap();
            assert!(view.len() <= last);
            for d in view.values(ORDER_DATE).unwrap() {
                assert!(r.contains(d.as_date().unwrap()));
            }
            last = view.len();
            start = start.succ_opt().unwrap();
        }
    }

    #[test]
    fn full_range_keeps_all_dated_rows_in_order() {
        let ds = sample();
        let view = filter_by_date_range(&ds, &ds.date_bounds().unwrap()).unwrap();
        assert_eq!(products(&view), vec!["Widget", "Gadget", "Gizmo", "Gadget"]);
    }

    #[test]
    fn predicates_commute() {
        let ds = sample();
        let by_category = ColumnPredicate::OneOf([CellValue::from("Tools")].into());
        let by_quantity = ColumnPredicate::Between { min: 3.0, max: 10.0 };

        let mut ab = FilterState::new();
        ab.insert(CATEGORY.to_string(), by_category.clone());
        ab.insert(QUANTITY.to_string(), by_quantity.clone());
        let mut ba = FilterState::new();
        ba.insert(QUANTITY.to_string(), by_quantity.clone());
        ba.insert(CATEGORY.to_string(), by_category.clone());

        let together = filter_by_column_predicates(&ds, &ab).unwrap();
        assert_eq!(together, filter_by_column_predicates(&ds, &ba).unwrap());

        // Applying them one after the other, in either order, agrees too.
        let single = |col: &str, p: &ColumnPredicate| {
            let mut f = FilterState::new();
            f.insert(col.to_string(), p.clone());
            f
        };
        let a_then_b = filter_by_column_predicates(
            &filter_by_column_predicates(&ds, &single(CATEGORY, &by_category)).unwrap(),
            &single(QUANTITY, &by_quantity),
        )
        .unwrap();
        let b_then_a = filter_by_column_predicates(
            &filter_by_column_predicates(&ds, &single(QUANTITY, &by_quantity)).unwrap(),
            &single(CATEGORY, &by_category),
        )
        .unwrap();
        assert_eq!(a_then_b, together);
        assert_eq!(b_then_a, together);
        assert_eq!(products(&together), vec!["Widget", "Widget"]);
    }

    #[test]
    fn empty_selection_matches_nothing() {
        let ds = sample();
        let mut filters = FilterState::new();
        filters.insert(PRODUCT.to_string(), ColumnPredicate::OneOf(BTreeSet::new()));
        assert!(filter_by_column_predicates(&ds, &filters).unwrap().is_empty());
    }

    #[test]
    fn contains_ignores_case() {
        let ds = sample();
        let mut filters = FilterState::new();
        filters.insert(PRODUCT.to_string(), ColumnPredicate::Contains("gAd".to_string()));
        let view = filter_by_column_predicates(&ds, &filters).unwrap();
        assert_eq!(products(&view), vec!["Gadget", "Gadget"]);
    }

    #[test]
    fn date_within_skips_null_dates() {
        let ds = sample();
        let mut filters = FilterState::new();
        filters.insert(
            ORDER_DATE.to_string(),
            ColumnPredicate::DateWithin(range(date(2024, 1, 1), date(2024, 1, 31))),
        );
        let view = filter_by_column_predicates(&ds, &filters).unwrap();
        assert_eq!(products(&view), vec!["Widget", "Gadget"]);
    }

    #[test]
    fn rejects_unknown_and_mistyped_columns() {
        let ds = sample();
        let mut filters = FilterState::new();
        filters.insert("Nope".to_string(), ColumnPredicate::Contains("x".to_string()));
        assert!(matches!(
            filter_by_column_predicates(&ds, &filters),
            Err(Error::UnknownColumn(_))
        ));

        let mut filters = FilterState::new();
        filters.insert(PRODUCT.to_string(), ColumnPredicate::Between { min: 0.0, max: 1.0 });
        assert!(matches!(
            filter_by_column_predicates(&ds, &filters),
            Err(Error::NotNumeric(_))
        ));
    }

    #[test]
    fn initial_state_selects_everything() {
        let ds = sample();
        let state = init_filter_state(&ds).unwrap();
        assert!(state.contains_key(PRODUCT));
        assert_eq!(
            state.get(QUANTITY),
            Some(&ColumnPredicate::Between { min: 2.0, max: 12.0 })
        );
        assert!(!state.contains_key(ORDER_DATE));
        assert_eq!(filter_by_column_predicates(&ds, &state).unwrap(), ds);
    }

    #[test]
    fn selections_follow_the_column_kind() {
        let ds = Dataset::new(
            vec![
                Column::new(UNIT_PRICE, ColumnKind::Float),
                Column::new("Region", ColumnKind::Text),
                Column::new(QUANTITY, ColumnKind::Integer),
            ],
            vec![
                Record::new(vec![10.0.into(), "1".into(), 3i64.into()]),
                Record::new(vec![2.5.into(), "2".into(), 4i64.into()]),
            ],
        );
        let json = r#"{
            "UnitPrice": { "one_of": [10] },
            "Region": { "one_of": [1] },
            "Quantity": { "one_of": ["3", 3.0] }
        }"#;
        let filters: FilterState = serde_json::from_str(json).unwrap();
        let view = filter_by_column_predicates(&ds, &filters).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view.records()[0].get(0), &CellValue::Float(10.0));

        let mut filters = FilterState::new();
        filters.insert(
            ORDER_DATE.to_string(),
            ColumnPredicate::OneOf([CellValue::from("2024-01-20")].into()),
        );
        let view = filter_by_column_predicates(&sample(), &filters).unwrap();
        assert_eq!(products(&view), vec!["Gadget"]);
    }

    #[test]
    fn predicates_deserialize_from_json() {
        let json = r#"{
            "Product": { "one_of": ["Widget", "Gizmo"] },
            "Quantity": { "between": { "min": 1, "max": 9 } }
        }"#;
        let filters: FilterState = serde_json::from_str(json).unwrap();
        let view = filter_by_column_predicates(&sample(), &filters).unwrap();
        assert_eq!(products(&view), vec!["Widget", "Gizmo"]);
    }
}
