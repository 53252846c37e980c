use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::filter::FilterState;
use crate::data::loader::{load_file, DatePolicy};
use crate::data::model::{Dataset, PRODUCT, TOTAL_PRICE};
use crate::data::{Error, Result};

pub const DEFAULT_DATA_PATH: &str = "data.csv";
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

// ---------------------------------------------------------------------------
// Data source
// ---------------------------------------------------------------------------

/// Where the dataset comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// The bundled dataset at [`DashboardConfig::default_path`].
    #[default]
    Default,
    /// A user-supplied file; must be a `.csv`.
    Upload(PathBuf),
}

impl DataSource {
    pub fn label(&self) -> &'static str {
        match self {
            DataSource::Default => "Default Dataset",
            DataSource::Upload(_) => "Upload Your Own Dataset",
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard configuration
// ---------------------------------------------------------------------------

/// Everything a dashboard run depends on. Missing fields take their
/// defaults, so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub source: DataSource,
    pub default_path: PathBuf,
    /// Start of the date filter; the dataset's first date when absent.
    pub start: Option<NaiveDate>,
    /// End of the date filter; the dataset's last date when absent.
    pub end: Option<NaiveDate>,
    pub filters: FilterState,
    pub date_policy: DatePolicy,
    /// Numeric column summarised by the metric cards.
    pub metric_column: String,
    /// Column whose non-null values are counted on the first card.
    pub count_column: String,
    /// Scatter axes; the first text / numeric column when absent.
    pub scatter_x: Option<String>,
    pub scatter_y: Option<String>,
    /// Histogram feature; the first text column when absent.
    pub histogram_column: Option<String>,
    pub histogram_bins: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Default,
            default_path: PathBuf::from(DEFAULT_DATA_PATH),
            start: None,
            end: None,
            filters: FilterState::new(),
            date_policy: DatePolicy::default(),
            metric_column: TOTAL_PRICE.to_string(),
            count_column: PRODUCT.to_string(),
            scatter_x: None,
            scatter_y: None,
            histogram_column: None,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        }
    }
}

impl DashboardConfig {
    /// Read a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
        let config: DashboardConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.histogram_bins == 0 {
            return Err(Error::InvalidConfig("histogram_bins must be at least 1".to_string()));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(Error::InvalidDateRange { start, end });
            }
        }
        Ok(())
    }

    /// Load the dataset named by `source`.
    pub fn load_dataset(&self) -> Result<Dataset> {
        let path = match &self.source {
            DataSource::Default => &self.default_path,
            DataSource::Upload(path) => path,
        };
        log::debug!("loading {} from {}", self.source.label(), path.display());
        load_file(path, self.date_policy)
    }
}
