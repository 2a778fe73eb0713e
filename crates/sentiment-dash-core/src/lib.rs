//! # Sentiment Dashboard Core
//!
//! Pure logic for the sentiment dashboard: data models, period resolution,
//! session reconciliation, aggregation, and the record source trait.
//!
//! This crate performs no HTTP, filesystem, or terminal I/O. The calling
//! application supplies a [`source::RecordSource`] implementation and a
//! presentation surface for the aggregated table.

pub mod aggregate;
pub mod error;
pub mod models;
pub mod period;
pub mod session;
pub mod source;

pub use error::{DashboardError, SourceError};
