//! Session reconciliation: when to re-query, and how to take a result.
//!
//! A [`SessionState`] is owned by one user session and passed by `&mut` into
//! each handler. The fetch-derived fields (rows, selector, resolved period,
//! query text) live together in one [`ActiveFetch`] value, so they can only
//! be replaced as a unit.
//!
//! # Refresh Flow
//!
//! 1. Skip the fetch if [`should_refetch`] says the cached rows still apply.
//! 2. Resolve the selector against "now" in the reporting timezone.
//! 3. Call the record source once.
//! 4. Hand the batch to [`apply_fetch_result`]; empty batches change nothing.
//!
//! Any error along the way returns before step 4, leaving the state as it was.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::DashboardError;
use crate::models::Row;
use crate::period::{resolve, PeriodSelector, ResolvedPeriod};
use crate::source::{RecordBatch, RecordSource};

/// Everything derived from the last successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFetch {
    pub selector: PeriodSelector,
    pub resolved: ResolvedPeriod,
    pub records: Vec<Row>,
    pub query_text: String,
}

/// Per-session dashboard state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    authenticated: bool,
    active: Option<ActiveFetch>,
}

impl SessionState {
    /// Empty, unauthenticated state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn active(&self) -> Option<&ActiveFetch> {
        self.active.as_ref()
    }

    pub fn records(&self) -> &[Row] {
        self.active.as_ref().map(|a| a.records.as_slice()).unwrap_or(&[])
    }

    pub fn row_count(&self) -> usize {
        self.records().len()
    }

    pub fn active_period(&self) -> Option<&PeriodSelector> {
        self.active.as_ref().map(|a| &a.selector)
    }

    pub fn active_resolved(&self) -> Option<&ResolvedPeriod> {
        self.active.as_ref().map(|a| &a.resolved)
    }

    pub fn last_query_text(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.query_text.as_str())
    }
}

/// Whether `requested` needs a new fetch given `state`.
///
/// True on an unauthenticated session, on a different selector, and always
/// for custom ranges.
pub fn should_refetch(state: &SessionState, requested: &PeriodSelector) -> bool {
    if !state.authenticated || requested.is_custom() {
        return true;
    }
    state.active_period() != Some(requested)
}

/// Result of handing a fetched batch to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Rows replaced the previous fetch.
    Applied { rows: usize },
    /// No rows came back; the previous fetch (if any) is kept.
    Empty,
}

/// Take a fetch result into the session.
///
/// An empty batch leaves `state` untouched and does not mark the session
/// authenticated. Otherwise every fetch-derived field is replaced in one
/// assignment.
pub fn apply_fetch_result(
    state: &mut SessionState,
    selector: PeriodSelector,
    resolved: ResolvedPeriod,
    batch: RecordBatch,
) -> ApplyOutcome {
    if batch.rows.is_empty() {
        tracing::info!(period = %selector, "fetch returned no rows; keeping previous data");
        return ApplyOutcome::Empty;
    }

    let rows = batch.rows.len();
    let next = SessionState {
        authenticated: true,
        active: Some(ActiveFetch {
            selector,
            resolved,
            records: batch.rows,
            query_text: batch.query_text,
        }),
    };
    *state = next;

    ApplyOutcome::Applied { rows }
}

/// What a [`refresh`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The session already holds rows for this selector; nothing was fetched.
    Cached,
    /// New rows were fetched and applied.
    Fetched { rows: usize },
    /// The source returned no rows; previous data is kept.
    Empty,
}

/// Run one fetch action for `selector`.
///
/// With `force`, the [`should_refetch`] check is skipped (an explicit
/// "fetch" click). The source is called at most once.
///
/// # Errors
///
/// [`DashboardError::InvalidRange`], [`DashboardError::UnsupportedPeriod`],
/// or [`DashboardError::Source`]. In every case `state` is unchanged.
pub async fn refresh<S: RecordSource + ?Sized>(
    state: &mut SessionState,
    source: &S,
    selector: PeriodSelector,
    now: DateTime<Utc>,
    tz: Tz,
    force: bool,
) -> Result<RefreshOutcome, DashboardError> {
    if !force && !should_refetch(state, &selector) {
        tracing::debug!(period = %selector, "selector unchanged; using cached rows");
        return Ok(RefreshOutcome::Cached);
    }

    let resolved = resolve(&selector, now, tz)?;

    tracing::debug!(
        source = source.name(),
        start = resolved.start_iso(),
        end = resolved.end_iso(),
        "fetching records"
    );

    let batch = match source
        .fetch_records(resolved.start_iso(), resolved.end_iso())
        .await
    {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!(source = source.name(), error = %e, "fetch failed; session unchanged");
            return Err(e.into());
        }
    };

    match apply_fetch_result(state, selector, resolved, batch) {
        ApplyOutcome::Applied { rows } => Ok(RefreshOutcome::Fetched { rows }),
        ApplyOutcome::Empty => Ok(RefreshOutcome::Empty),
    }
}
