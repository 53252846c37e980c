use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::model::{CellValue, Column, ColumnKind, Dataset, Record, ORDER_DATE, REQUIRED_COLUMNS};

/// What to do with an `OrderDate` cell that is not a recognisable date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// Replace the value with `Null` and keep the row.
    #[default]
    Coerce,
    /// Fail the whole load with [`Error::InvalidDate`].
    Strict,
}

/// Cell spellings read as a missing value, the same set dataframe readers
/// treat as NA by default. Matched exactly, after trimming.
const NA_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a sales dataset from a file. Dispatch by extension.
///
/// Only `.csv` is supported; any other extension is rejected before the
/// file is opened, so a bad upload never gets partially processed.
pub fn load_file(path: &Path, policy: DatePolicy) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => {
            let file = File::open(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
            let dataset = load_reader(file, policy)?;
            log::info!(
                "loaded {} rows x {} columns from {}",
                dataset.len(),
                dataset.columns().len(),
                path.display()
            );
            Ok(dataset)
        }
        other => Err(Error::UnsupportedFileType(format!(".{other}"))),
    }
}

/// Parse CSV text with a header row into a [`Dataset`].
///
/// Column kinds are inferred from the whole column: integers if every
/// non-empty cell is an `i64`, floats if every one is an `f64`, text
/// otherwise. `OrderDate` is always a date column, coerced under `policy`.
pub fn load_reader<R: Read>(source: R, policy: DatePolicy) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(Error::MissingColumn(required.to_string()));
        }
    }

    let raw_rows = reader
        .records()
        .collect::<std::result::Result<Vec<csv::StringRecord>, csv::Error>>()?;

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let kind = if name == ORDER_DATE {
                ColumnKind::Date
            } else {
                infer_kind(raw_rows.iter().map(|r| r.get(idx).unwrap_or("")))
            };
            Column::new(name.clone(), kind)
        })
        .collect();

    let mut coerced = 0usize;
    let mut records = Vec::with_capacity(raw_rows.len());

    for (row_no, raw) in raw_rows.iter().enumerate() {
        let mut values = Vec::with_capacity(columns.len());
        for (col_idx, column) in columns.iter().enumerate() {
            let text = raw.get(col_idx).unwrap_or("");
            let value = match column.kind {
                ColumnKind::Date => match parse_date(text) {
                    Some(d) => CellValue::Date(d),
                    None if is_missing(text) => CellValue::Null,
                    None => match policy {
                        DatePolicy::Strict => {
                            return Err(Error::InvalidDate {
                                row: row_no + 1,
                                column: column.name.clone(),
                                value: text.to_string(),
                            })
                        }
                        DatePolicy::Coerce => {
                            coerced += 1;
                            CellValue::Null
                        }
                    },
                },
                kind => parse_cell(text, kind),
            };
            values.push(value);
        }
        records.push(Record::new(values));
    }

    if coerced > 0 {
        log::warn!("{coerced} value(s) in column {ORDER_DATE} are not dates and were set to null");
    }

    Ok(Dataset::new(columns, records))
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || NA_TOKENS.contains(&cell)
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind = ColumnKind::Integer;
    for cell in cells.filter(|c| !is_missing(c)) {
        if kind == ColumnKind::Integer && cell.parse::<i64>().is_err() {
            kind = ColumnKind::Float;
        }
        if kind == ColumnKind::Float && cell.parse::<f64>().is_err() {
            return ColumnKind::Text;
        }
    }
    // An all-empty column stays numeric, holding only nulls.
    kind
}

/// Missing markers and non-finite floats (`inf`) become `Null`.
fn parse_cell(s: &str, kind: ColumnKind) -> CellValue {
    if is_missing(s) {
        return CellValue::Null;
    }
    match kind {
        ColumnKind::Integer => s.parse().map(CellValue::Integer).unwrap_or(CellValue::Null),
        ColumnKind::Float => match s.parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Float(v),
            _ => CellValue::Null,
        },
        ColumnKind::Date => parse_date(s).map(CellValue::Date).unwrap_or(CellValue::Null),
        ColumnKind::Text => CellValue::Text(s.to_string()),
    }
}

/// Parse the date spellings commonly found in exported sales sheets.
/// Any time-of-day part is discarded.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::model::{PRODUCT, QUANTITY, TOTAL_PRICE, UNIT_PRICE};

    const HEADER: &str = "OrderDate,Product,Category,Quantity,UnitPrice,TotalPrice,Region\n";

    fn csv(body: &str) -> String {
        format!("{HEADER}{body}")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn infers_column_kinds() {
        let text = csv(
            "2024-01-01,Widget,Tools,10,2.5,25,North\n\
             2024-01-02,Gadget,Toys,3,4,12,\n",
        );
        let ds = load_reader(text.as_bytes(), DatePolicy::Coerce).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.column(ORDER_DATE).unwrap().kind, ColumnKind::Date);
        assert_eq!(ds.column(PRODUCT).unwrap().kind, ColumnKind::Text);
        assert_eq!(ds.column(QUANTITY).unwrap().kind, ColumnKind::Integer);
        assert_eq!(ds.column(UNIT_PRICE).unwrap().kind, ColumnKind::Float);
        assert_eq!(ds.column(TOTAL_PRICE).unwrap().kind, ColumnKind::Integer);
        assert_eq!(ds.column("Region").unwrap().kind, ColumnKind::Text);

        let regions: Vec<_> = ds.values("Region").unwrap().cloned().collect();
        assert_eq!(regions, vec![CellValue::from("North"), CellValue::Null]);
    }

    #[test]
    fn column_order_is_preserved() {
        let ds = load_reader(csv("").as_bytes(), DatePolicy::Coerce).unwrap();
        let names: Vec<&str> = ds.column_names().collect();
        assert_eq!(
            names,
            vec!["OrderDate", "Product", "Category", "Quantity", "UnitPrice", "TotalPrice", "Region"]
        );
        assert!(ds.is_empty());
    }

    #[test]
    fn coerces_bad_dates_to_null() {
        let text = csv(
            "not-a-date,Widget,Tools,1,1,1,North\n\
             03/15/2024,Gadget,Toys,2,1,2,South\n",
        );
        let ds = load_reader(text.as_bytes(), DatePolicy::Coerce).unwrap();
        let dates: Vec<_> = ds.values(ORDER_DATE).unwrap().cloned().collect();
        assert_eq!(dates, vec![CellValue::Null, CellValue::Date(date(2024, 3, 15))]);
    }

    #[test]
    fn strict_policy_rejects_bad_dates() {
        let text = csv(
            "2024-01-01,Widget,Tools,1,1,1,North\n\
             yesterday,Gadget,Toys,2,1,2,South\n",
        );
        match load_reader(text.as_bytes(), DatePolicy::Strict) {
            Err(Error::InvalidDate { row, value, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "yesterday");
            }
            other => panic!("expected an invalid date error, got {:?}", other),
        }
    }

    #[test]
    fn strict_policy_allows_empty_dates() {
        let text = csv(",Widget,Tools,1,1,1,North\n");
        let ds = load_reader(text.as_bytes(), DatePolicy::Strict).unwrap();
        assert!(ds.records()[0].get(0).is_null());
    }

    #[test]
    fn missing_value_markers_load_as_null() {
        let text = csv(
            "2024-01-01,Widget,Tools,N/A,2.5,10,NA\n\
             NaN,Gadget,Toys,3,inf,NaN,North\n\
             2024-01-03,null,Toys,4,1.5,12,\n",
        );
        let ds = load_reader(text.as_bytes(), DatePolicy::Strict).unwrap();
        assert_eq!(ds.column(QUANTITY).unwrap().kind, ColumnKind::Integer);
        assert_eq!(ds.column(UNIT_PRICE).unwrap().kind, ColumnKind::Float);
        assert_eq!(ds.column(TOTAL_PRICE).unwrap().kind, ColumnKind::Integer);
        assert_eq!(ds.column("Region").unwrap().kind, ColumnKind::Text);

        let quantities: Vec<_> = ds.values(QUANTITY).unwrap().cloned().collect();
        assert_eq!(quantities, vec![CellValue::Null, 3i64.into(), 4i64.into()]);
        let prices: Vec<_> = ds.values(UNIT_PRICE).unwrap().cloned().collect();
        assert_eq!(prices, vec![2.5.into(), CellValue::Null, 1.5.into()]);
        let totals: Vec<_> = ds.values(TOTAL_PRICE).unwrap().cloned().collect();
        assert_eq!(totals, vec![10i64.into(), CellValue::Null, 12i64.into()]);
        assert!(ds.records()[1].get(0).is_null());
        assert!(ds.records()[2].get(1).is_null());
    }

    #[test]
    fn rejects_missing_required_column() {
        let text = "OrderDate,Product,Quantity\n2024-01-01,Widget,3\n";
        match load_reader(text.as_bytes(), DatePolicy::Coerce) {
            Err(Error::MissingColumn(col)) => assert_eq!(col, "Category"),
            other => panic!("expected a missing column error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_ragged_rows() {
        let text = csv("2024-01-01,Widget,Tools,1\n");
        assert!(matches!(
            load_reader(text.as_bytes(), DatePolicy::Coerce),
            Err(Error::Csv(_))
        ));
    }

    #[test]
    fn rejects_non_csv_extensions() {
        for name in ["sales.xlsx", "sales.json", "sales"] {
            assert!(matches!(
                load_file(Path::new(name), DatePolicy::Coerce),
                Err(Error::UnsupportedFileType(_))
            ));
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_file(Path::new("/definitely/not/here.csv"), DatePolicy::Coerce),
            Err(Error::Io(_, _))
        ));
    }

    #[test]
    fn parses_common_date_spellings() {
        let expected = Some(date(2024, 2, 29));
        assert_eq!(parse_date("2024-02-29"), expected);
        assert_eq!(parse_date("2024/02/29"), expected);
        assert_eq!(parse_date("02/29/2024"), expected);
        assert_eq!(parse_date("2024-02-29 13:45:00"), expected);
        assert_eq!(parse_date("2024-02-29T13:45:00"), expected);
        assert_eq!(parse_date("2024-02-29T13:45:00+02:00"), expected);
        assert_eq!(parse_date("2023-02-29"), None);
        assert_eq!(parse_date(""), None);
    }
}
