//! Error types for the catalog engine.
//!
//! Only contract violations and dispatch failures are errors. Malformed
//! filter input is recovered locally and reported as a
//! [`FilterWarning`](crate::query::FilterWarning) instead.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the engine and the offload coordinator
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A query was issued before any dataset was loaded
    #[error("no dataset loaded")]
    NoDataset,

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A newer submission replaced this one before it ran
    #[error("query {seq} superseded by query {latest}")]
    Superseded { seq: u64, latest: u64 },

    /// The background worker could not be started
    #[error("background worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The background worker did not answer within the budget
    #[error("background worker timed out after {0:?}")]
    WorkerTimeout(Duration),

    /// The background worker crashed or returned a failure
    #[error("background worker failed: {0}")]
    WorkerFailed(String),

    /// The dataset could not be read or decoded
    #[error("dataset error: {0}")]
    Dataset(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
