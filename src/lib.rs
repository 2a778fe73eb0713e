//! # Sentiment Dashboard
//!
//! A reporting dashboard for call-summary sentiment. It resolves a reporting
//! period in a fixed timezone, pulls the matching records from Salesforce,
//! aggregates them by sentiment, and renders the breakdown as one of eleven
//! chart types.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │   Period     │──▶│   Session     │──▶│  Aggregate   │
//! │  Resolver    │   │  Reconciler   │   │  + Charts    │
//! └──────────────┘   └──────┬────────┘   └──────┬───────┘
//!                           │                   │
//!                    ┌──────▼──────┐     ┌──────▼──────┐
//!                    │ Salesforce  │     │ table / json│
//!                    │ (SOAP+REST) │     │   / html    │
//!                    └─────────────┘     └─────────────┘
//! ```
//!
//! The resolver, reconciler, and aggregation live in
//! [`sentiment_dash_core`]; this crate adds configuration, the Salesforce
//! record source, chart rendering, and the `sdash` command-line shell.
//!
//! ## Quick Start
//!
//! ```bash
//! sdash status                           # check config and credentials
//! sdash period --period quarter          # show the resolved interval
//! sdash report --period month --chart pie --format html --output pie.html
//! sdash shell                            # interactive session
//! sdash demo --chart treemap             # offline sample data
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`salesforce`] | Salesforce record source |
//! | [`chart`] | Chart registry and Plotly figures |
//! | [`report`] | One-shot report pipeline |
//! | [`shell`] | Interactive dashboard loop |
//! | [`status`] | Config and credential health |

pub mod chart;
pub mod config;
pub mod report;
pub mod salesforce;
pub mod shell;
pub mod status;
