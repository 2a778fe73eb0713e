//! # Sentiment Dashboard CLI (`sdash`)
//!
//! Resolves reporting periods, pulls call-summary records from Salesforce,
//! and prints or charts the sentiment breakdown.
//!
//! ## Usage
//!
//! ```bash
//! sdash --config ./config/sdash.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sdash period` | Print the resolved interval for a period |
//! | `sdash report` | Fetch one period and print / chart the breakdown |
//! | `sdash shell` | Interactive session that re-fetches only when needed |
//! | `sdash demo` | Run a report against built-in sample data |
//! | `sdash charts` | List chart types |
//! | `sdash status` | Check configuration and credentials |
//! | `sdash completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! # This quarter, as a pie chart in a standalone HTML page
//! sdash report --period quarter --chart pie --output quarter.html
//!
//! # A custom range, negatives and neutrals only
//! sdash report --start 2024-01-01 --end 2024-03-15 --sentiment negative,neutral
//!
//! # Where does "this week" start and end right now?
//! sdash period --period week
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sentiment_dash::chart::{ChartKind, ChartRegistry};
use sentiment_dash::config::{self, Config};
use sentiment_dash::report::{self, OutputFormat, ReportOptions};
use sentiment_dash::salesforce::SalesforceSource;
use sentiment_dash::shell::{self, Dashboard};
use sentiment_dash::status;
use sentiment_dash_core::aggregate::SentimentFilter;
use sentiment_dash_core::models::Sentiment;
use sentiment_dash_core::period::{resolve, PeriodSelector};
use sentiment_dash_core::source::memory::InMemorySource;
use sentiment_dash_core::source::RecordSource;

/// Sentiment Dashboard CLI — call-sentiment reporting over Salesforce data.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "sdash",
    about = "Sentiment Dashboard — resolve a reporting period, pull CRM records, aggregate and chart them",
    version,
    long_about = "Sentiment Dashboard authenticates against Salesforce, pulls call-summary records \
    for a reporting period (this week, month, quarter, a rolling window, or a custom range) in a \
    fixed reporting timezone, aggregates them by call sentiment, and renders the breakdown as a \
    table or one of eleven Plotly chart types."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sdash.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the interval a period resolves to. No network access.
    Period {
        #[command(flatten)]
        period: PeriodArgs,
    },

    /// Fetch one period from Salesforce and print the breakdown.
    ///
    /// Prints the sentiment table to stdout. With `--format json|html` (or an
    /// `--output` ending in `.json`/`.html`) the selected chart is written too.
    Report {
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Interactive session over stdin.
    ///
    /// Keeps one session for the whole run: selecting the period that is
    /// already loaded does not query Salesforce again. Type `help` inside.
    Shell {
        /// Initial period.
        #[arg(long)]
        period: Option<PeriodSelector>,

        /// Initial chart type.
        #[arg(long)]
        chart: Option<ChartKind>,

        /// Use built-in sample data instead of Salesforce.
        #[arg(long)]
        demo: bool,
    },

    /// Run a report against built-in sample data.
    Demo {
        #[command(flatten)]
        report: ReportArgs,
    },

    /// List available chart types.
    Charts,

    /// Show configuration and whether credentials are set.
    Status,

    /// Print a shell completion script.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Clone)]
struct PeriodArgs {
    /// Reporting period: week, month, quarter, last-7-days, last-30-days,
    /// last-90-days, last-3-years, or custom:YYYY-MM-DD..YYYY-MM-DD.
    #[arg(long)]
    period: Option<PeriodSelector>,

    /// Custom range start (YYYY-MM-DD). Requires `--end`.
    #[arg(long, requires = "end", conflicts_with = "period")]
    start: Option<NaiveDate>,

    /// Custom range end (YYYY-MM-DD), inclusive. Requires `--start`.
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,

    /// Resolve relative to this instant (RFC 3339) instead of now.
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

impl PeriodArgs {
    fn selector(&self, cfg: &Config) -> Result<PeriodSelector> {
        match (self.period, self.start, self.end) {
            (Some(p), _, _) => Ok(p),
            (None, Some(start), Some(end)) => Ok(PeriodSelector::custom(start, end)?),
            (None, None, None) => cfg.default_period(),
            _ => bail!("--start and --end must be given together"),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.at.unwrap_or_else(Utc::now)
    }
}

#[derive(Args, Clone)]
struct ReportArgs {
    #[command(flatten)]
    period: PeriodArgs,

    /// Chart type (see `sdash charts`).
    #[arg(long)]
    chart: Option<ChartKind>,

    /// Only include these sentiments (comma-separated).
    #[arg(long, value_delimiter = ',')]
    sentiment: Vec<Sentiment>,

    /// Output format: table, json, or html. Inferred from `--output` if omitted.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Write the chart to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl ReportArgs {
    fn options(&self, cfg: &Config) -> Result<ReportOptions> {
        let format = match (self.format, &self.output) {
            (Some(f), _) => f,
            (None, Some(path)) => OutputFormat::from_path(path).unwrap_or(OutputFormat::Html),
            (None, None) => OutputFormat::Table,
        };
        Ok(ReportOptions {
            selector: self.period.selector(cfg)?,
            chart: match self.chart {
                Some(c) => c,
                None => cfg.default_chart()?,
            },
            filter: SentimentFilter::only(self.sentiment.iter().copied()),
            format,
            output: self.output.clone(),
        })
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't need config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "sdash", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Charts => {
            for kind in ChartRegistry::builtin().kinds() {
                println!("{:<12} {}", kind.slug(), kind.title());
            }
            return Ok(());
        }
        _ => {}
    }

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::info!(path = %cli.config.display(), "config file not found; using defaults");
        Config::minimal()
    };
    let tz = cfg.timezone()?;

    match cli.command {
        Commands::Period { period } => {
            let selector = period.selector(&cfg)?;
            let resolved = resolve(&selector, period.now(), tz)?;
            report::print_period(&selector, &resolved);
        }
        Commands::Report { report } => {
            let opts = report.options(&cfg)?;
            let source = SalesforceSource::new(&cfg.salesforce)?;
            report::run_report(&source, tz, &opts, report.period.now()).await?;
        }
        Commands::Demo { report } => {
            let opts = report.options(&cfg)?;
            let now = report.period.now();
            let source = InMemorySource::new(report::demo_rows(now));
            report::run_report(&source, tz, &opts, now).await?;
        }
        Commands::Shell {
            period,
            chart,
            demo,
        } => {
            let selector = match period {
                Some(p) => p,
                None => cfg.default_period()?,
            };
            let chart = match chart {
                Some(c) => c,
                None => cfg.default_chart()?,
            };
            let source: Box<dyn RecordSource> = if demo {
                Box::new(InMemorySource::new(report::demo_rows(Utc::now())))
            } else {
                Box::new(SalesforceSource::new(&cfg.salesforce)?)
            };

            let mut dashboard = Dashboard::new(tz, selector, chart);
            let prompt = atty::is(atty::Stream::Stdin);
            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            shell::run_shell(
                &mut dashboard,
                source.as_ref(),
                stdin.lock(),
                &mut stdout,
                prompt,
                Utc::now,
            )
            .await?;
            stdout.flush()?;
        }
        Commands::Status => {
            status::print_status(&cfg)?;
        }
        Commands::Completions { .. } | Commands::Charts => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
