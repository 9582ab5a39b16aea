//! Tabulon command line
//!
//! Loads a JSON array of objects, runs it through the view engine and prints
//! the requested page as a table.
//!
//! Usage:
//!   tabulon sales.json --filter sales:gt:60 --sort sales:desc --page-size 10
//!   tabulon sales.json --search west --columns region,sales --export csv
//!   tabulon sales.json --insights

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde_json::{Map, Value};
use tabulon_core::logging::{self, LoggingConfig};
use tabulon_core::{CellValue, ColumnDescriptor, EngineConfig, FeatureFlags, RowKey};
use tabulon_engine::ViewEngine;
use tabulon_view::{Combinator, FilterRule, FilterState, SortDirection, SortState};

#[derive(Parser, Debug)]
#[command(name = "tabulon")]
#[command(about = "Filter, sort and page through a JSON table", version)]
struct Args {
    /// JSON file holding an array of objects
    file: PathBuf,

    /// Case-insensitive text searched across every column
    #[arg(long, short)]
    search: Option<String>,

    /// Filter rule as column:operator[:value[:value2]], repeatable
    #[arg(long = "filter", short = 'f')]
    filters: Vec<String>,

    /// How filter rules are combined
    #[arg(long, default_value = "and")]
    combinator: Combinator,

    /// Sort key as column[:asc|desc]
    #[arg(long)]
    sort: Option<String>,

    /// Page to show, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,

    #[arg(long)]
    page_size: Option<usize>,

    /// Comma-separated list of columns to show
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Field used as the row key; rows are keyed by position when omitted
    #[arg(long)]
    key: Option<String>,

    /// Print the filtered view instead of a page
    #[arg(long, value_enum)]
    export: Option<ExportFormat>,

    /// Generate dataset insights with the simulated handlers
    #[arg(long)]
    insights: bool,

    /// Engine config file (defaults to the user config directory)
    #[arg(long, env = "TABULON_CONFIG")]
    config: Option<PathBuf>,

    /// Write JSON logs to this directory instead of the console
    #[arg(long)]
    log_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

/// One input object plus its position in the file
#[derive(Debug, Clone)]
struct Row {
    index: usize,
    fields: Map<String, Value>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let logging_config = match &args.log_json {
        Some(dir) => LoggingConfig::production(dir.clone()),
        None => LoggingConfig {
            default_filter: "warn".to_string(),
            ..LoggingConfig::default()
        },
    };
    logging::init(logging_config)?;

    let config = load_config(&args)?;
    let rows = load_rows(&args.file)?;
    let columns = infer_columns(&rows);
    tracing::info!(rows = rows.len(), columns = columns.len(), "Loaded input");

    let key_field = args.key.clone();
    let mut engine = ViewEngine::builder(columns, move |row: &Row| row_key(row, key_field.as_deref()))
        .records(rows)
        .config(config)
        .build()
        .context("Failed to build view")?;

    apply_view_args(&mut engine, &args)?;

    if args.insights {
        engine.settle().await;
        if let Some(error) = engine.job_status(tabulon_engine::JobKind::Insights).error.as_deref() {
            bail!("Insight generation failed: {error}");
        }
    }

    match args.export {
        Some(ExportFormat::Csv) => print!("{}", engine.export_visible()?),
        Some(ExportFormat::Json) => println!("{}", engine.export_visible_json()?),
        None => print_page(&engine),
    }

    if args.insights {
        print_insights(&engine);
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => match EngineConfig::default_path() {
            Ok(path) => EngineConfig::load(&path)?,
            Err(_) => EngineConfig::default(),
        },
    };

    // Only the jobs this command can show are worth running.
    let mut features = FeatureFlags::none();
    features.insights = args.insights;
    features.export = config.features.export;
    config.features = features;

    if let Some(page_size) = args.page_size {
        config.default_page_size = page_size;
    }
    Ok(config)
}

fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} as JSON", path.display()))?;

    let Value::Array(items) = value else {
        bail!("{} must contain a JSON array of objects", path.display());
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(Row { index, fields }),
            other => bail!("Element {index} is not an object: {other}"),
        })
        .collect()
}

fn row_key(row: &Row, key_field: Option<&str>) -> RowKey {
    match key_field.and_then(|field| row.fields.get(field)) {
        Some(Value::String(s)) => RowKey::new(s),
        Some(value) => RowKey::new(value.to_string()),
        None => RowKey::from(row.index as u64),
    }
}

/// One column per distinct field, in first-seen order. A column is numeric
/// when every non-null value in it is a number.
fn infer_columns(rows: &[Row]) -> Vec<ColumnDescriptor<Row>> {
    let mut names: Vec<&String> = Vec::new();
    for row in rows {
        for name in row.fields.keys() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    names
        .into_iter()
        .map(|name| {
            let numeric = rows
                .iter()
                .filter_map(|row| row.fields.get(name))
                .filter(|value| !value.is_null())
                .all(Value::is_number);

            let field = name.clone();
            let column = ColumnDescriptor::new(name.clone(), name.clone(), move |row: &Row| {
                row.fields
                    .get(&field)
                    .map(CellValue::from_json)
                    .unwrap_or(CellValue::Null)
            });
            if numeric { column.numeric() } else { column }
        })
        .collect()
}

fn apply_view_args(engine: &mut ViewEngine<Row>, args: &Args) -> Result<()> {
    if let Some(search) = &args.search {
        engine.set_search(search.as_str());
    }

    if !args.filters.is_empty() {
        let rules = args
            .filters
            .iter()
            .enumerate()
            .map(|(id, arg)| parse_filter(id, arg))
            .collect::<Result<Vec<_>>>()?;
        engine
            .set_filter(FilterState::new(rules, args.combinator))
            .context("Invalid filter")?;
    }

    if let Some(arg) = &args.sort {
        let (column, direction) = match arg.split_once(':') {
            Some((column, direction)) => (column, direction.parse::<SortDirection>()?),
            None => (arg.as_str(), SortDirection::Asc),
        };
        engine
            .set_sort(Some(SortState::new(column, direction)))
            .context("Invalid sort")?;
    }

    if !args.columns.is_empty() {
        engine.hide_all_columns();
        for column in &args.columns {
            engine
                .set_column_visible(column.trim(), true)
                .context("Invalid column list")?;
        }
    }

    if args.page == 0 {
        bail!("Pages start at 1");
    }
    engine.set_page(args.page - 1);
    Ok(())
}

/// `column:operator[:value[:value2]]`
fn parse_filter(id: usize, arg: &str) -> Result<FilterRule> {
    let mut parts = arg.splitn(4, ':');
    let column = parts.next().unwrap_or_default();
    let Some(operator) = parts.next() else {
        bail!("Filter '{arg}' needs at least column:operator");
    };
    let value = parts.next().unwrap_or_default();
    let value2 = parts.next().map(str::to_string);

    FilterRule::parse(id, column, operator, value, value2)
        .with_context(|| format!("Invalid filter '{arg}'"))
}

fn print_page(engine: &ViewEngine<Row>) {
    let view = engine.view();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(view.columns.iter().map(|c| c.label.as_str()));

    for row in &view.rows {
        table.add_row(view.columns.iter().map(|c| c.render(row)));
    }

    println!("{table}");
    println!(
        "Page {} of {} ({} of {} rows)",
        view.page_index + 1,
        view.page_count,
        view.filtered_count,
        view.total_count
    );
}

fn print_insights(engine: &ViewEngine<Row>) {
    let insights = engine.insights();
    if insights.is_empty() {
        println!("No insights");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Severity", "Insight", "Confidence"]);

    for insight in insights {
        table.add_row(vec![
            format!("{:?}", insight.severity),
            format!("{}: {}", insight.title, insight.description),
            format!("{:.0}%", insight.confidence * 100.0),
        ]);
    }
    println!("{table}");
}
