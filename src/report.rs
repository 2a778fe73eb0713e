//! One-shot report pipeline: resolve, fetch, aggregate, print, chart.
//!
//! Used by `sdash report` (Salesforce) and `sdash demo` (in-memory sample
//! data). The breakdown table goes to stdout; log lines go to stderr.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::chart::{ChartInput, ChartKind, ChartRegistry, Figure};
use sentiment_dash_core::aggregate::{aggregate, filter_rows, CategoryCount, SentimentFilter};
use sentiment_dash_core::models::{Row, Sentiment};
use sentiment_dash_core::period::{PeriodSelector, ResolvedPeriod};
use sentiment_dash_core::session::{refresh, RefreshOutcome, SessionState};
use sentiment_dash_core::source::RecordSource;

/// How the chart is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Breakdown table only.
    Table,
    /// Plotly figure JSON.
    Json,
    /// Standalone HTML page.
    Html,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            other => Err(format!("unknown format '{}'. Use table, json, or html.", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
        })
    }
}

impl OutputFormat {
    /// Guess the format from an output file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "html" | "htm" => Some(OutputFormat::Html),
            _ => None,
        }
    }
}

/// Options for one report run.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub selector: PeriodSelector,
    pub chart: ChartKind,
    pub filter: SentimentFilter,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Fetch one period from `source` and print the breakdown.
///
/// An empty result prints "No data found" and succeeds.
pub async fn run_report<S: RecordSource + ?Sized>(
    source: &S,
    tz: Tz,
    opts: &ReportOptions,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut state = SessionState::new();
    let outcome = refresh(&mut state, source, opts.selector, now, tz, true).await?;

    if outcome == RefreshOutcome::Empty {
        println!("No data found for {}.", opts.selector.label());
        return Ok(());
    }

    let resolved = state
        .active_resolved()
        .context("session has no resolved period after a successful fetch")?;
    print!("{}", period_header(&opts.selector, resolved, state.row_count()));

    let rows = filter_rows(state.records(), &opts.filter);
    let table = aggregate(rows.iter().copied());
    println!();
    print!("{}", format_breakdown(&table));

    if opts.format == OutputFormat::Table {
        return Ok(());
    }

    let figure = ChartRegistry::builtin().render(
        opts.chart,
        &ChartInput {
            rows: &rows,
            table: &table,
        },
    )?;
    emit_figure(&figure, opts.format, opts.output.as_deref())
}

/// Print a resolved period without fetching anything.
pub fn print_period(selector: &PeriodSelector, resolved: &ResolvedPeriod) {
    println!("{}", selector.label());
    println!("  selector: {}", selector);
    println!("  start:    {}", resolved.start_iso());
    println!("  end:      {}", resolved.end_iso());
    println!("  timezone: {}", resolved.start().timezone());
}

pub fn period_header(selector: &PeriodSelector, resolved: &ResolvedPeriod, rows: usize) -> String {
    format!(
        "Sentiment Breakdown: {}\n  {} .. {}\n  records: {}\n",
        selector.label(),
        resolved.start_iso(),
        resolved.end_iso(),
        rows
    )
}

/// Render the breakdown as an aligned text table.
pub fn format_breakdown(table: &[CategoryCount]) -> String {
    let mut out = format!("  {:<16} {:>8} {:>12}\n", "CALL SENTIMENT", "COUNT", "PERCENTAGE");
    out.push_str(&format!("  {}\n", "-".repeat(38)));
    for line in table {
        out.push_str(&format!(
            "  {:<16} {:>8} {:>11.2}%\n",
            line.category.as_str(),
            line.count,
            line.percentage
        ));
    }
    if table.is_empty() {
        out.push_str("  (no rows match the current filter)\n");
    }
    out
}

/// Write a figure as JSON or HTML to `output`, or stdout when `None`.
pub fn emit_figure(figure: &Figure, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let content = match format {
        OutputFormat::Json => figure.to_json()?,
        OutputFormat::Html => figure.to_html()?,
        OutputFormat::Table => return Ok(()),
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, &content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} chart to {}", format, path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Deterministic sample rows covering the three years before `now`.
///
/// Roughly half positive, a quarter neutral, and the rest split between
/// negative and N/A.
pub fn demo_rows(now: DateTime<Utc>) -> Vec<Row> {
    const SAMPLES: i64 = 1200;
    let span_minutes = Duration::days(1095).num_minutes();
    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;

    let mut rows: Vec<Row> = (0..SAMPLES)
        .map(|i| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let sentiment = match seed % 8 {
                0..=3 => Sentiment::Positive,
                4 | 5 => Sentiment::Neutral,
                6 => Sentiment::Negative,
                _ => Sentiment::NA,
            };
            // Denser toward the present so short windows still have data.
            let age = span_minutes * i * i / (SAMPLES * SAMPLES);
            Row::new(
                format!("a0B{:06}", i),
                sentiment,
                now - Duration::minutes(age + 1),
            )
        })
        .collect();

    rows.sort_by_key(|r| r.created_at);
    rows
}
