/// Data layer: core types, loading, filtering and the derived numbers.
///
/// Architecture:
/// ```text
///  data.csv / upload.csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse CSV → Dataset, coerce OrderDate
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  typed columns, Vec<Record>
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  date range + column predicates → new Dataset
///   └──────────┘
///        │
///        ├────────────────┐
///        ▼                ▼
///   ┌──────────┐   ┌───────────┐
///   │ metrics   │   │ aggregate  │  chart series
///   └──────────┘   └───────────┘
/// ```

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod model;

pub use error::{Error, Result};
