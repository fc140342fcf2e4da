//! Messages exchanged with the background worker.
//!
//! Requests carry only data: a shared read-only dataset snapshot and the
//! query parameters. The worker runs the same engine code as the calling
//! thread and answers each job with exactly one [`Response`].

use crate::engine::QueryResult;
use crate::query::CatalogQuery;
use crate::record::Record;
use std::sync::Arc;
use std::sync::mpsc::SyncSender;

/// A query to run in the background
pub struct Job {
    /// Submission sequence number
    pub seq: u64,
    pub records: Arc<[Record]>,
    pub query: CatalogQuery,
    /// Single-use reply channel
    pub reply: SyncSender<Response>,
}

/// Request from the coordinator to the worker
pub enum Request {
    /// Execute a query
    Run(Job),
    /// Drop the worker's indexes and caches
    Clear,
    /// Exit the worker loop
    Shutdown,
    /// Make the next job fail
    #[cfg(test)]
    Inject(Fault),
}

/// Failure modes the worker can be told to produce for its next job
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Panic mid-query, after the engine has been loaded
    Panic,
    /// Drop the job without replying
    DropReply,
}

/// Reply from the worker for one job
#[derive(Debug)]
pub enum Response {
    /// Query completed
    Done { seq: u64, result: QueryResult },
    /// A newer submission existed when the job was dequeued
    Skipped { seq: u64, latest: u64 },
    /// The query failed or panicked
    Failed { seq: u64, message: String },
}

impl Response {
    pub fn seq(&self) -> u64 {
        match self {
            Response::Done { seq, .. }
            | Response::Skipped { seq, .. }
            | Response::Failed { seq, .. } => *seq,
        }
    }
}
