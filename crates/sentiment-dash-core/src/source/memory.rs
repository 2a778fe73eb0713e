//! In-memory [`RecordSource`] for tests and the offline demo.
//!
//! Holds a fixed row set behind a `std::sync::RwLock` and filters it by the
//! requested range on every call. It can be primed to fail the next fetch,
//! which is how the "source error leaves state unchanged" path is exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::models::Row;

use super::{RecordBatch, RecordSource};

/// In-memory record source.
pub struct InMemorySource {
    rows: RwLock<Vec<Row>>,
    fail_next: RwLock<Option<SourceError>>,
    calls: AtomicUsize,
}

impl InMemorySource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: RwLock::new(rows),
            fail_next: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the stored rows.
    pub fn set_rows(&self, rows: Vec<Row>) {
        if let Ok(mut guard) = self.rows.write() {
            *guard = rows;
        }
    }

    /// Make the next [`fetch_records`](RecordSource::fetch_records) call fail with `err`.
    pub fn fail_next(&self, err: SourceError) {
        if let Ok(mut guard) = self.fail_next.write() {
            *guard = Some(err);
        }
    }

    /// Number of fetches attempted so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn parse_bound(iso: &str) -> Result<DateTime<Utc>, SourceError> {
    DateTime::parse_from_rfc3339(iso)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SourceError::Decode(format!("bad range bound '{}': {}", iso, e)))
}

#[async_trait]
impl RecordSource for InMemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_records(
        &self,
        start_iso: &str,
        end_iso: &str,
    ) -> Result<RecordBatch, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self
            .fail_next
            .write()
            .map_err(|_| SourceError::Http("memory source lock poisoned".to_string()))?
            .take()
        {
            return Err(err);
        }

        let start = parse_bound(start_iso)?;
        let end = parse_bound(end_iso)?;

        let rows = self
            .rows
            .read()
            .map_err(|_| SourceError::Http("memory source lock poisoned".to_string()))?
            .iter()
            .filter(|r| r.created_at >= start && r.created_at <= end)
            .cloned()
            .collect();

        Ok(RecordBatch {
            rows,
            query_text: format!("created_at >= {} AND created_at <= {}", start_iso, end_iso),
        })
    }
}
