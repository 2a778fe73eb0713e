//! Record source abstraction.
//!
//! The [`RecordSource`] trait is the only way the session obtains rows.
//! Implementations receive the resolved period's ISO boundaries verbatim and
//! return every matching row in source order, or a [`SourceError`].
//!
//! Implementations make a single attempt per call; retrying is left to the
//! user.

pub mod memory;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::Row;

/// Rows returned by one fetch, with the literal query that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    pub rows: Vec<Row>,
    /// Filter text as issued to the backend, kept for diagnostics.
    pub query_text: String,
}

/// Backend that can return rows created within an inclusive time range.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Short identifier used in logs (e.g. `"salesforce"`).
    fn name(&self) -> &str;

    /// Fetch every row whose creation instant lies in `[start_iso, end_iso]`.
    async fn fetch_records(&self, start_iso: &str, end_iso: &str)
        -> Result<RecordBatch, SourceError>;
}
