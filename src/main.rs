use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;

use sales_dashboard::config::{DashboardConfig, DataSource};
use sales_dashboard::data::filter::ColumnPredicate;
use sales_dashboard::data::loader::{parse_date, DatePolicy};
use sales_dashboard::data::model::CellValue;
use sales_dashboard::report::render_text;
use sales_dashboard::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "sales-dashboard", about, version)]
struct Args {
    /// JSON configuration file. Flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analyse this CSV file instead of the default dataset.
    #[arg(long)]
    upload: Option<PathBuf>,

    /// Location of the default dataset.
    #[arg(long)]
    data: Option<PathBuf>,

    /// First order date to include.
    #[arg(long, value_parser = parse_date_arg)]
    start: Option<NaiveDate>,

    /// Last order date to include.
    #[arg(long, value_parser = parse_date_arg)]
    end: Option<NaiveDate>,

    /// Keep rows whose COLUMN is one of the values: COLUMN=a,b,c
    #[arg(long = "select", value_name = "COLUMN=VALUES", value_parser = parse_assignment)]
    selects: Vec<(String, String)>,

    /// Keep rows whose numeric COLUMN lies in a range: COLUMN=min..max
    #[arg(long = "between", value_name = "COLUMN=MIN..MAX", value_parser = parse_assignment)]
    betweens: Vec<(String, String)>,

    /// Keep rows whose text COLUMN contains a substring: COLUMN=text
    #[arg(long = "contains", value_name = "COLUMN=TEXT", value_parser = parse_assignment)]
    contains: Vec<(String, String)>,

    /// Numeric column summarised by the metric cards.
    #[arg(long)]
    metric_column: Option<String>,

    /// Fail on unparseable order dates instead of ignoring them.
    #[arg(long)]
    strict_dates: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    let mut state = AppState::new(config);

    state.load().context("loading dataset")?;
    if let Some(msg) = &state.status_message {
        log::info!("{msg}");
    }

    let report = state.refresh()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<DashboardConfig> {
    let mut config = match &args.config {
        Some(path) => DashboardConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => DashboardConfig::default(),
    };

    if let Some(path) = &args.upload {
        config.source = DataSource::Upload(path.clone());
    }
    if let Some(path) = &args.data {
        config.default_path = path.clone();
    }
    if args.start.is_some() {
        config.start = args.start;
    }
    if args.end.is_some() {
        config.end = args.end;
    }
    if let Some(column) = &args.metric_column {
        config.metric_column = column.clone();
    }
    if args.strict_dates {
        config.date_policy = DatePolicy::Strict;
    }

    for (column, values) in &args.selects {
        let selected = values.split(',').map(|v| CellValue::from(v.trim())).collect();
        config.filters.insert(column.clone(), ColumnPredicate::OneOf(selected));
    }
    for (column, bounds) in &args.betweens {
        let Some((min, max)) = bounds.split_once("..") else {
            bail!("expected MIN..MAX for --between {column}, got \"{bounds}\"");
        };
        let min: f64 = min.trim().parse().with_context(|| format!("--between {column}: bad minimum"))?;
        let max: f64 = max.trim().parse().with_context(|| format!("--between {column}: bad maximum"))?;
        config.filters.insert(column.clone(), ColumnPredicate::Between { min, max });
    }
    for (column, needle) in &args.contains {
        config.filters.insert(column.clone(), ColumnPredicate::Contains(needle.clone()));
    }

    config.validate()?;
    Ok(config)
}

fn parse_date_arg(s: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("\"{s}\" is not a date (expected YYYY-MM-DD)"))
}

fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((column, value)) if !column.is_empty() => Ok((column.to_string(), value.to_string())),
        _ => Err(format!("expected COLUMN=VALUE, got \"{s}\"")),
    }
}
