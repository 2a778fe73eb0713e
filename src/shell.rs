//! Interactive dashboard shell.
//!
//! Reads one command per line and keeps a single [`SessionState`] for the
//! whole run, so switching back to the period that is already loaded does
//! not hit the record source again.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `period <selector>` | Select the reporting window (validated immediately) |
//! | `fetch` | Load the selected window if it differs from what is loaded |
//! | `refetch` | Load the selected window unconditionally |
//! | `chart <kind>` | Select the chart type |
//! | `filter <s,..>` / `filter all` | Limit which sentiments are shown |
//! | `show` | Print the breakdown table |
//! | `export <path>` | Write the current chart as `.json` or `.html` |
//! | `status` | Print session bookkeeping |
//! | `help`, `quit` | |

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::chart::{ChartInput, ChartKind, ChartRegistry, Figure};
use crate::report::{format_breakdown, period_header, OutputFormat};
use sentiment_dash_core::aggregate::{aggregate, filter_rows, SentimentFilter};
use sentiment_dash_core::models::Sentiment;
use sentiment_dash_core::period::PeriodSelector;
use sentiment_dash_core::session::{refresh, RefreshOutcome, SessionState};
use sentiment_dash_core::source::RecordSource;

const HELP: &str = "\
commands:
  period <selector>    week | month | quarter | last-N-days | custom:YYYY-MM-DD..YYYY-MM-DD
  fetch                load the selected period (skipped if already loaded)
  refetch              load the selected period again
  chart <kind>         bar | pie | scatter | line | histogram | box | treemap | sunburst | funnel | area | sine
  filter <s,..>|all    positive, negative, neutral, n/a
  show                 print the breakdown table
  export <path>        write the chart (.json or .html)
  status               show session state
  quit";

/// Per-session view settings plus the session state they apply to.
pub struct Dashboard {
    pub state: SessionState,
    pub selector: PeriodSelector,
    pub chart: ChartKind,
    pub filter: SentimentFilter,
    pub tz: Tz,
    registry: ChartRegistry,
}

impl Dashboard {
    pub fn new(tz: Tz, selector: PeriodSelector, chart: ChartKind) -> Self {
        Self {
            state: SessionState::new(),
            selector,
            chart,
            filter: SentimentFilter::all(),
            tz,
            registry: ChartRegistry::builtin(),
        }
    }

    /// Render the selected chart over the loaded, filtered rows.
    pub fn figure(&self) -> Result<Figure> {
        let rows = filter_rows(self.state.records(), &self.filter);
        let table = aggregate(rows.iter().copied());
        self.registry.render(
            self.chart,
            &ChartInput {
                rows: &rows,
                table: &table,
            },
        )
    }
}

/// Drive `dashboard` from `input` until EOF or `quit`.
///
/// `now` is called for every fetch so relative periods track the clock.
/// Command errors are reported on `out` and do not end the loop.
pub async fn run_shell<S, R, W, N>(
    dashboard: &mut Dashboard,
    source: &S,
    input: R,
    out: &mut W,
    prompt: bool,
    now: N,
) -> Result<()>
where
    S: RecordSource + ?Sized,
    R: BufRead,
    W: Write,
    N: Fn() -> DateTime<Utc>,
{
    writeln!(out, "Sentiment dashboard. Type 'help' for commands.")?;

    let mut lines = input.lines();
    loop {
        if prompt {
            write!(out, "[{}] > ", dashboard.selector)?;
            out.flush()?;
        }

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        match cmd {
            "quit" | "exit" => break,
            "help" => writeln!(out, "{}", HELP)?,
            "period" => match arg.parse::<PeriodSelector>() {
                Ok(selector) => {
                    dashboard.selector = selector;
                    writeln!(out, "period: {}", selector.label())?;
                }
                Err(e) => writeln!(out, "error: {}", e)?,
            },
            "fetch" | "refetch" => {
                let force = cmd == "refetch";
                let result = refresh(
                    &mut dashboard.state,
                    source,
                    dashboard.selector,
                    now(),
                    dashboard.tz,
                    force,
                )
                .await;
                match result {
                    Ok(RefreshOutcome::Fetched { rows }) => {
                        writeln!(out, "fetched {} records for {}", rows, dashboard.selector.label())?
                    }
                    Ok(RefreshOutcome::Cached) => writeln!(
                        out,
                        "already loaded: {} ({} records)",
                        dashboard.selector.label(),
                        dashboard.state.row_count()
                    )?,
                    Ok(RefreshOutcome::Empty) => writeln!(
                        out,
                        "No data found for {}. Keeping previous data.",
                        dashboard.selector.label()
                    )?,
                    Err(e) => writeln!(out, "error: {}", e)?,
                }
            }
            "chart" => match arg.parse::<ChartKind>() {
                Ok(kind) => {
                    dashboard.chart = kind;
                    writeln!(out, "chart: {}", kind.title())?;
                }
                Err(e) => writeln!(out, "error: {}", e)?,
            },
            "filter" => match parse_filter(arg) {
                Ok(filter) => {
                    dashboard.filter = filter;
                    writeln!(out, "filter: {}", describe_filter(&dashboard.filter))?;
                }
                Err(e) => writeln!(out, "error: {}", e)?,
            },
            "show" => match dashboard.state.active() {
                Some(active) => {
                    write!(
                        out,
                        "{}",
                        period_header(&active.selector, &active.resolved, active.records.len())
                    )?;
                    let rows = filter_rows(&active.records, &dashboard.filter);
                    write!(out, "{}", format_breakdown(&aggregate(rows.iter().copied())))?;
                }
                None => writeln!(out, "Fetch data first to view the breakdown.")?,
            },
            "export" => {
                if dashboard.state.active().is_none() {
                    writeln!(out, "Fetch data first to export a chart.")?;
                    continue;
                }
                match export(dashboard, Path::new(arg)) {
                    Ok(()) => writeln!(out, "wrote {}", arg)?,
                    Err(e) => writeln!(out, "error: {:#}", e)?,
                }
            }
            "status" => write_status(dashboard, out)?,
            other => writeln!(out, "unknown command '{}'. Type 'help'.", other)?,
        }
    }

    Ok(())
}

fn export(dashboard: &Dashboard, path: &Path) -> Result<()> {
    let format = OutputFormat::from_path(path)
        .ok_or_else(|| anyhow::anyhow!("export path must end in .json or .html"))?;
    let figure = dashboard.figure()?;
    crate::report::emit_figure(&figure, format, Some(path))
}

fn parse_filter(arg: &str) -> Result<SentimentFilter, String> {
    if arg.is_empty() || arg.eq_ignore_ascii_case("all") {
        return Ok(SentimentFilter::all());
    }
    let sentiments = arg
        .split(',')
        .map(|s| s.parse::<Sentiment>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SentimentFilter::only(sentiments))
}

fn describe_filter(filter: &SentimentFilter) -> String {
    if filter.is_all() {
        return "all".to_string();
    }
    Sentiment::ALL
        .iter()
        .filter(|s| filter.allows(**s))
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_status<W: Write>(dashboard: &Dashboard, out: &mut W) -> Result<()> {
    writeln!(out, "authenticated: {}", dashboard.state.is_authenticated())?;
    writeln!(out, "selected:      {}", dashboard.selector)?;
    writeln!(out, "chart:         {}", dashboard.chart)?;
    writeln!(out, "filter:        {}", describe_filter(&dashboard.filter))?;
    match dashboard.state.active() {
        Some(active) => {
            writeln!(out, "loaded:        {}", active.selector)?;
            writeln!(out, "rows:          {}", active.records.len())?;
            writeln!(
                out,
                "range:         {} .. {}",
                active.resolved.start_iso(),
                active.resolved.end_iso()
            )?;
            writeln!(out, "query:         {}", active.query_text)?;
        }
        None => writeln!(out, "loaded:        nothing")?,
    }
    Ok(())
}
