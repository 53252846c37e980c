use std::fmt;

use serde::Serialize;

use crate::config::DashboardConfig;
use crate::data::aggregate::{
    aggregate_by_month, aggregate_for_chart, histogram, scatter_points, GroupOrder, GroupValue,
    Histogram, MonthlyValue, Reducer, ScatterPoint,
};
use crate::data::filter::{
    ensure_non_empty, filter_by_column_predicates, filter_by_date_range, FilterState,
};
use crate::data::metrics::{compute_metrics, count_non_null, MetricSet};
use crate::data::model::{Dataset, DateRange, CATEGORY, PRODUCT, QUANTITY, TOTAL_PRICE, UNIT_PRICE};
use crate::data::Result;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Values behind the metric cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCards {
    /// Non-null values of the count column ("Total Inventory Products").
    pub total_products: usize,
    pub price: MetricSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterChart {
    pub x: String,
    pub y: String,
    pub points: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramChart {
    pub column: String,
    #[serde(flatten)]
    pub histogram: Histogram,
}

/// Everything the presentation layer needs for one dashboard render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub date_range: DateRange,
    pub rows: usize,
    pub metrics: MetricCards,
    /// Summed quantity per product, largest first.
    pub products_by_quantity: Vec<GroupValue>,
    /// Total price per order, by product and coloured by category.
    pub price_by_product: Vec<ScatterPoint>,
    /// Summed unit price per month and product.
    pub unit_price_by_month: Vec<MonthlyValue>,
    pub scatter: Option<ScatterChart>,
    pub histogram: Option<HistogramChart>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the whole pipeline for one interaction: filter `dataset` by `range`
/// and `filters`, then derive every metric and chart series.
///
/// Stops with [`crate::data::Error::EmptyResult`] when nothing is left after
/// filtering; no partial report is produced.
pub fn build_report(
    dataset: &Dataset,
    range: &DateRange,
    filters: &FilterState,
    config: &DashboardConfig,
) -> Result<DashboardReport> {
    let view = filter_by_date_range(dataset, range)?;
    let view = ensure_non_empty(filter_by_column_predicates(&view, filters)?)?;

    let metrics = MetricCards {
        total_products: count_non_null(&view, &config.count_column)?,
        price: compute_metrics(&view, &config.metric_column)?,
    };

    let products_by_quantity = aggregate_for_chart(
        &view,
        PRODUCT,
        QUANTITY,
        Reducer::Sum,
        GroupOrder::ValueDescending,
    )?;
    let price_by_product = scatter_points(&view, PRODUCT, TOTAL_PRICE, CATEGORY)?;
    let unit_price_by_month = aggregate_by_month(&view, UNIT_PRICE, PRODUCT)?;

    let categorical = view.categorical_columns();
    let numeric = view.numeric_columns();

    let scatter_x = config.scatter_x.as_deref().or(categorical.first().copied());
    let scatter_y = config.scatter_y.as_deref().or(numeric.first().copied());
    let scatter = match (scatter_x, scatter_y) {
        (Some(x), Some(y)) => Some(ScatterChart {
            x: x.to_string(),
            y: y.to_string(),
            points: scatter_points(&view, x, y, PRODUCT)?,
        }),
        _ => None,
    };

    let histogram_chart = match config.histogram_column.as_deref().or(categorical.first().copied()) {
        Some(column) => Some(HistogramChart {
            column: column.to_string(),
            histogram: histogram(&view, column, config.histogram_bins)?,
        }),
        None => None,
    };

    Ok(DashboardReport {
        date_range: *range,
        rows: view.len(),
        metrics,
        products_by_quantity,
        price_by_product,
        unit_price_by_month,
        scatter,
        histogram: histogram_chart,
    })
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

/// `1234567.8` → `"1,234,568"`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Plain-text rendering of a report for terminals.
pub fn render_text(report: &DashboardReport) -> String {
    report.to_string()
}

impl fmt::Display for DashboardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let price = &self.metrics.price;
        writeln!(f, "Business Metrics ({})  [{} rows]", self.date_range, self.rows)?;
        writeln!(f, "  Total Inventory Products: {}", self.metrics.total_products)?;
        writeln!(f, "  Total Price (USD):        {}", format_thousands(price.sum))?;
        writeln!(f, "  Max Price (USD):          {}", format_thousands(price.max))?;
        writeln!(f, "  Min Price (USD):          {}", format_thousands(price.min))?;
        writeln!(f, "  Price Range (USD):        {}", format_thousands(price.range))?;

        writeln!(f, "\nProducts & Quantities")?;
        for g in &self.products_by_quantity {
            writeln!(f, "  {:<24} {:>10}", g.group.to_string(), format_thousands(g.value))?;
        }

        writeln!(f, "\nProducts & Total Price")?;
        write_points(f, &self.price_by_product)?;

        writeln!(f, "\nProducts & Unit Price (by month)")?;
        for m in &self.unit_price_by_month {
            writeln!(f, "  {:<4} {:<24} {:>12.2}", m.month_name, m.series.to_string(), m.value)?;
        }

        if let Some(scatter) = &self.scatter {
            writeln!(f, "\nScatter of {} vs {}", scatter.y, scatter.x)?;
            write_points(f, &scatter.points)?;
        }

        if let Some(hist) = &self.histogram {
            writeln!(f, "\nHistogram of {}", hist.column)?;
            match &hist.histogram {
                Histogram::Categorical { counts } => {
                    for g in counts {
                        writeln!(f, "  {:<24} {:>6}", g.group.to_string(), g.value)?;
                    }
                }
                Histogram::Numeric { bins } => {
                    for b in bins {
                        writeln!(f, "  [{:>10.2}, {:>10.2}] {:>6}", b.lower, b.upper, b.count)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn write_points(f: &mut fmt::Formatter<'_>, points: &[ScatterPoint]) -> fmt::Result {
    for p in points {
        writeln!(f, "  {:<24} {:>12.2}  ({})", p.x.to_string(), p.y, p.color)?;
    }
    Ok(())
}
