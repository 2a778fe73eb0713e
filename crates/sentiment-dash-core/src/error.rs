//! Error types shared by the resolver, the reconciler, and record sources.

use chrono::NaiveDate;
use thiserror::Error;

/// Failure reported by a [`RecordSource`](crate::source::RecordSource).
///
/// Any of these leaves the session exactly as it was before the attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("source misconfigured: {0}")]
    Config(String),
}

/// Errors surfaced by period resolution and session refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DashboardError {
    /// Custom range whose start date falls after its end date.
    #[error("invalid range: start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("unsupported period: {0}")]
    UnsupportedPeriod(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}
