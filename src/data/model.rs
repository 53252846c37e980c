use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// Column names the dashboard relies on.
pub const ORDER_DATE: &str = "OrderDate";
pub const PRODUCT: &str = "Product";
pub const CATEGORY: &str = "Category";
pub const QUANTITY: &str = "Quantity";
pub const UNIT_PRICE: &str = "UnitPrice";
pub const TOTAL_PRICE: &str = "TotalPrice";

/// Every loaded dataset must carry these columns; anything else is kept as-is.
pub const REQUIRED_COLUMNS: [&str; 6] =
    [ORDER_DATE, PRODUCT, CATEGORY, QUANTITY, UNIT_PRICE, TOTAL_PRICE];

// ---------------------------------------------------------------------------
// CellValue – a single cell of the table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common dataframe dtypes.
/// Used as a `BTreeMap` / `BTreeSet` key downstream, so it must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn discriminant(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Integer(_) => 1,
                Float(_) => 2,
                Text(_) => 3,
                Date(_) => 4,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v:.2}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// Interpret the value as an `f64` for numeric aggregation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// Selections coming from configuration are plain JSON scalars.
impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_json::Value::Null => CellValue::Null,
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Integer(i),
                None => CellValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => CellValue::Text(s),
            other => CellValue::Text(other.to_string()),
        })
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Storage type of a column, inferred once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Date,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    pub fn is_categorical(self) -> bool {
        self == ColumnKind::Text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

static NULL: CellValue = CellValue::Null;

// ---------------------------------------------------------------------------
// Record – one row of the table
// ---------------------------------------------------------------------------

/// A single row. Values are positionally aligned with [`Dataset::columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<CellValue>,
}

impl Record {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> &CellValue {
        self.values.get(index).unwrap_or(&NULL)
    }
}

// ---------------------------------------------------------------------------
// DateRange
// ---------------------------------------------------------------------------

/// An inclusive range of calendar dates with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl<'de> Deserialize<'de> for DateRange {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            start: NaiveDate,
            end: NaiveDate,
        }
        let raw = Raw::deserialize(deserializer)?;
        DateRange::new(raw.start, raw.end).map_err(serde::de::Error::custom)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Clamp both ends into `bounds`. A range lying entirely outside the
    /// bounds collapses onto the nearest bound.
    pub fn clamp_to(&self, bounds: &DateRange) -> DateRange {
        let start = self.start.clamp(bounds.start, bounds.end);
        let end = self.end.clamp(bounds.start, bounds.end);
        DateRange { start, end }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table, or a filtered view of it
// ---------------------------------------------------------------------------

/// An ordered sequence of records sharing a fixed schema.
///
/// Filtering never mutates a dataset; it produces a new one with the same
/// columns and a subsequence of the rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, records: Vec<Record>) -> Self {
        Dataset { columns, records }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        let idx = self.column_index(name)?;
        Ok(&self.columns[idx])
    }

    /// Index of `name`, failing unless the column is numeric.
    pub fn numeric_column_index(&self, name: &str) -> Result<usize> {
        let idx = self.column_index(name)?;
        if !self.columns[idx].kind.is_numeric() {
            return Err(Error::NotNumeric(name.to_string()));
        }
        Ok(idx)
    }

    /// All values of one column, in row order.
    pub fn values<'a>(&'a self, name: &str) -> Result<impl Iterator<Item = &'a CellValue> + 'a> {
        let idx = self.column_index(name)?;
        Ok(self.records.iter().map(move |r| r.get(idx)))
    }

    /// Sorted set of distinct values in a column (including `Null` if present).
    pub fn unique_values(&self, name: &str) -> Result<BTreeSet<CellValue>> {
        Ok(self.values(name)?.cloned().collect())
    }

    /// Smallest and largest non-null value of a numeric column.
    pub fn numeric_bounds(&self, name: &str) -> Result<Option<(f64, f64)>> {
        let idx = self.numeric_column_index(name)?;
        Ok(self
            .records
            .iter()
            .filter_map(|r| r.get(idx).as_f64())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            }))
    }

    /// Earliest and latest `OrderDate`, ignoring rows whose date is null.
    pub fn date_bounds(&self) -> Result<DateRange> {
        let idx = self.column_index(ORDER_DATE)?;
        let mut dates = self.records.iter().filter_map(|r| r.get(idx).as_date());
        let first = dates
            .next()
            .ok_or_else(|| Error::NoDates(ORDER_DATE.to_string()))?;
        let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        DateRange::new(start, end)
    }

    /// Text columns, the candidates for grouping and category axes.
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind.is_categorical())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Integer and float columns, the candidates for value axes.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// A new dataset with the same schema holding the rows for which `keep`
    /// returns true, in their original order.
    pub fn retain_rows<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Dataset {
        Dataset::new(
            vec![
                Column::new(ORDER_DATE, ColumnKind::Date),
                Column::new(PRODUCT, ColumnKind::Text),
                Column::new(QUANTITY, ColumnKind::Integer),
            ],
            vec![
                Record::new(vec![date(2024, 3, 1).into(), "Widget".into(), 4i64.into()]),
                Record::new(vec![CellValue::Null, "Gadget".into(), 7i64.into()]),
                Record::new(vec![date(2024, 1, 15).into(), "Widget".into(), CellValue::Null]),
            ],
        )
    }

    #[test]
    fn cell_values_order_by_kind_then_value() {
        let mut values = vec![
            CellValue::from("b"),
            CellValue::from(2.5),
            CellValue::Null,
            CellValue::from(3i64),
            CellValue::from("a"),
            CellValue::from(1i64),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                CellValue::Null,
                CellValue::from(1i64),
                CellValue::from(3i64),
                CellValue::from(2.5),
                CellValue::from("a"),
                CellValue::from("b"),
            ]
        );
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        let err = DateRange::new(date(2024, 2, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange { .. }));
        assert!(DateRange::new(date(2024, 1, 1), date(2024, 1, 1)).is_ok());
    }

    #[test]
    fn date_range_deserialize_checks_order() {
        let ok: DateRange = serde_json::from_str(r#"{"start":"2024-01-01","end":"2024-01-31"}"#).unwrap();
        assert_eq!(ok.end(), date(2024, 1, 31));
        assert!(serde_json::from_str::<DateRange>(r#"{"start":"2024-02-01","end":"2024-01-31"}"#).is_err());
    }

    #[test]
    fn date_range_clamps_into_bounds() {
        let bounds = DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        let wide = DateRange::new(date(2023, 6, 1), date(2025, 6, 1)).unwrap();
        assert_eq!(wide.clamp_to(&bounds), bounds);

        let outside = DateRange::new(date(2025, 1, 1), date(2025, 2, 1)).unwrap();
        let clamped = outside.clamp_to(&bounds);
        assert_eq!(clamped.start(), date(2024, 12, 31));
        assert_eq!(clamped.end(), date(2024, 12, 31));
    }

    #[test]
    fn date_bounds_skip_null_dates() {
        let bounds = sample().date_bounds().unwrap();
        assert_eq!(bounds.start(), date(2024, 1, 15));
        assert_eq!(bounds.end(), date(2024, 3, 1));
    }

    #[test]
    fn column_lookup_and_kinds() {
        let ds = sample();
        assert_eq!(ds.categorical_columns(), vec![PRODUCT]);
        assert_eq!(ds.numeric_columns(), vec![QUANTITY]);
        assert!(matches!(ds.column_index("Nope"), Err(Error::UnknownColumn(_))));
        assert!(matches!(ds.numeric_column_index(PRODUCT), Err(Error::NotNumeric(_))));
        assert_eq!(ds.numeric_bounds(QUANTITY).unwrap(), Some((4.0, 7.0)));
        assert_eq!(ds.unique_values(PRODUCT).unwrap().len(), 2);
    }
}
