//! Moving large queries off the calling thread.
//!
//! [`OffloadCoordinator`] decides per submission where a query runs. Large
//! datasets go to a background worker thread owning its own
//! [`CatalogEngine`]; the reply is awaited with a timeout, and any failure
//! reruns the query on the calling thread in cooperative batches. Every
//! submission gets a sequence number so stale results can be recognized.

pub mod protocol;
mod worker;

pub use worker::WorkerStatsSnapshot;

use crate::config::{CatalogConfig, OffloadConfig};
use crate::engine::{CatalogEngine, QueryResult};
use crate::error::{CatalogError, Result};
use crate::query::CatalogQuery;
use crate::record::Record;
use protocol::{Job, Request, Response};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use worker::{WorkerHandle, WorkerStats};

/// Where a query was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Dispatch {
    /// On the background worker
    Background,
    /// On the calling thread by choice
    Foreground,
    /// On the calling thread after the background path failed
    Fallback,
}

/// A completed query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub seq: u64,
    pub dispatch: Dispatch,
    pub result: QueryResult,
}

/// Handle to a submitted query, redeemed with [`OffloadCoordinator::wait`]
pub struct Ticket {
    seq: u64,
    records: Arc<[Record]>,
    query: CatalogQuery,
    reply: Option<Receiver<Response>>,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether the query was handed to the background worker
    pub fn is_background(&self) -> bool {
        self.reply.is_some()
    }
}

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OffloadStats {
    pub background: u64,
    pub foreground: u64,
    pub fallbacks: u64,
    pub superseded: u64,
    pub worker: WorkerStatsSnapshot,
}

pub struct OffloadCoordinator {
    config: CatalogConfig,
    foreground: CatalogEngine,
    worker: Option<WorkerHandle>,
    worker_stats: Arc<WorkerStats>,
    latest: Arc<AtomicU64>,
    next_seq: u64,
    stats: OffloadStats,
}

impl OffloadCoordinator {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            foreground: CatalogEngine::new(config.engine.clone()),
            config,
            worker: None,
            worker_stats: Arc::new(WorkerStats::default()),
            latest: Arc::new(AtomicU64::new(0)),
            next_seq: 0,
            stats: OffloadStats::default(),
        }
    }

    fn offload_config(&self) -> &OffloadConfig {
        &self.config.offload
    }

    /// Submit a query. Large datasets are queued on the background worker
    /// right away; everything else runs when the ticket is redeemed.
    pub fn submit(&mut self, records: &Arc<[Record]>, query: &CatalogQuery) -> Ticket {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.latest.store(seq, Ordering::SeqCst);

        let mut ticket = Ticket {
            seq,
            records: records.clone(),
            query: query.clone(),
            reply: None,
        };

        let offload = self.offload_config();
        if !offload.enabled || records.len() <= offload.threshold {
            return ticket;
        }

        let Some(worker) = self.ensure_worker() else {
            return ticket;
        };

        let (reply, receiver) = mpsc::sync_channel(1);
        let job = Job {
            seq,
            records: records.clone(),
            query: query.clone(),
            reply,
        };
        match worker.send(Request::Run(job)) {
            Ok(()) => ticket.reply = Some(receiver),
            Err(_) => {
                tracing::warn!(
                    target: "modelcat::offload",
                    seq,
                    "Worker channel closed, running on calling thread"
                );
                self.worker = None;
            }
        }
        ticket
    }

    /// Wait for a submitted query
    pub fn wait(&mut self, ticket: Ticket) -> Result<QueryOutcome> {
        let Ticket {
            seq,
            records,
            query,
            reply,
        } = ticket;

        let Some(reply) = reply else {
            let offload = self.offload_config();
            let dispatch = if offload.enabled && records.len() > offload.threshold {
                Dispatch::Fallback
            } else {
                Dispatch::Foreground
            };
            return self.run_foreground(seq, &records, &query, dispatch);
        };

        let timeout = self.offload_config().timeout();
        let reason = match reply.recv_timeout(timeout) {
            Ok(Response::Done { seq, result }) => {
                self.stats.background += 1;
                return Ok(QueryOutcome {
                    seq,
                    dispatch: Dispatch::Background,
                    result,
                });
            }
            Ok(Response::Skipped { seq, latest }) => {
                self.stats.superseded += 1;
                return Err(CatalogError::Superseded { seq, latest });
            }
            Ok(Response::Failed { message, .. }) => CatalogError::WorkerFailed(message),
            Err(RecvTimeoutError::Timeout) => {
                // Anything queued behind the slow job would time out too
                if let Some(worker) = self.worker.take() {
                    worker.retire();
                }
                CatalogError::WorkerTimeout(timeout)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.worker = None;
                CatalogError::WorkerFailed("worker disconnected".to_string())
            }
        };

        tracing::warn!(
            target: "modelcat::offload",
            seq,
            error = %reason,
            "Background query failed, falling back to calling thread"
        );
        self.run_foreground(seq, &records, &query, Dispatch::Fallback)
    }

    /// Submit and wait
    pub fn run(&mut self, records: &Arc<[Record]>, query: &CatalogQuery) -> Result<QueryOutcome> {
        let ticket = self.submit(records, query);
        self.wait(ticket)
    }

    /// Whether `seq` is the most recent submission
    pub fn is_latest(&self, seq: u64) -> bool {
        seq == self.latest.load(Ordering::SeqCst)
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Invalidate caches and indexes on both execution paths
    pub fn clear_caches(&mut self) {
        self.foreground.clear_caches();
        if let Some(worker) = &self.worker
            && worker.send(Request::Clear).is_err()
        {
            self.worker = None;
        }
    }

    /// The calling-thread engine
    pub fn foreground(&self) -> &CatalogEngine {
        &self.foreground
    }

    pub fn stats(&self) -> OffloadStats {
        OffloadStats {
            worker: self.worker_stats.snapshot(),
            ..self.stats
        }
    }

    fn ensure_worker(&mut self) -> Option<&WorkerHandle> {
        if self.worker.is_none() {
            match WorkerHandle::spawn(
                self.config.engine.clone(),
                self.latest.clone(),
                self.worker_stats.clone(),
            ) {
                Ok(worker) => self.worker = Some(worker),
                Err(e) => {
                    let error = CatalogError::WorkerUnavailable(e.to_string());
                    tracing::warn!(target: "modelcat::offload", %error, "Running on calling thread");
                }
            }
        }
        self.worker.as_ref()
    }

    fn run_foreground(
        &mut self,
        seq: u64,
        records: &Arc<[Record]>,
        query: &CatalogQuery,
        dispatch: Dispatch,
    ) -> Result<QueryOutcome> {
        let latest = self.latest_seq();
        if seq < latest {
            self.stats.superseded += 1;
            return Err(CatalogError::Superseded { seq, latest });
        }

        let offload = self.offload_config();
        let batch = (records.len() > offload.threshold).then_some(offload.batch_size);
        self.foreground.set_cooperative(batch);

        let result = self.foreground.apply_query_to(records, query)?;
        match dispatch {
            Dispatch::Fallback => self.stats.fallbacks += 1,
            _ => self.stats.foreground += 1,
        }
        Ok(QueryOutcome {
            seq,
            dispatch,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offload::protocol::Fault;
    use crate::record::synthetic_records;

    fn config(enabled: bool, threshold: usize) -> CatalogConfig {
        let mut config = CatalogConfig::default();
        config.offload.enabled = enabled;
        config.offload.threshold = threshold;
        config
    }

    #[test]
    fn test_small_dataset_runs_in_foreground() {
        let mut coordinator = OffloadCoordinator::new(CatalogConfig::default());
        let records: Arc<[Record]> = Arc::from(synthetic_records(200, 1));

        let outcome = coordinator.run(&records, &CatalogQuery::new().search("chat")).unwrap();
        assert_eq!(outcome.dispatch, Dispatch::Foreground);
        assert!(coordinator.is_latest(outcome.seq));
        assert_eq!(coordinator.stats().foreground, 1);
    }

    #[test]
    fn test_large_dataset_runs_in_background() {
        let mut coordinator = OffloadCoordinator::new(config(true, 100));
        let records: Arc<[Record]> = Arc::from(synthetic_records(500, 2));
        let query = CatalogQuery::new().search("instruct");

        let ticket = coordinator.submit(&records, &query);
        assert!(ticket.is_background());
        let outcome = coordinator.wait(ticket).unwrap();
        assert_eq!(outcome.dispatch, Dispatch::Background);

        let mut engine = CatalogEngine::default();
        let expected = engine.apply_query_to(&records, &query).unwrap();
        assert_eq!(outcome.result.positions(), expected.positions());
    }

    #[test]
    fn test_disabled_large_dataset_is_cooperative_fallback() {
        let mut coordinator = OffloadCoordinator::new(config(false, 100));
        let records: Arc<[Record]> = Arc::from(synthetic_records(500, 3));

        let outcome = coordinator.run(&records, &CatalogQuery::new()).unwrap();
        assert_eq!(outcome.dispatch, Dispatch::Foreground);
        assert!(coordinator.foreground().diagnostics().cooperative_batch.is_some());
    }

    #[test]
    fn test_superseded_foreground_ticket() {
        let mut coordinator = OffloadCoordinator::new(CatalogConfig::default());
        let records: Arc<[Record]> = Arc::from(synthetic_records(50, 4));

        let stale = coordinator.submit(&records, &CatalogQuery::new().search("ll"));
        let fresh = coordinator.submit(&records, &CatalogQuery::new().search("llama"));
        assert!(!coordinator.is_latest(stale.seq()));

        let err = coordinator.wait(stale).unwrap_err();
        assert!(matches!(err, CatalogError::Superseded { seq: 1, latest: 2 }));
        assert!(coordinator.wait(fresh).is_ok());
        assert_eq!(coordinator.stats().superseded, 1);
    }

    fn inject(coordinator: &mut OffloadCoordinator, fault: Fault) {
        let worker = coordinator.ensure_worker().expect("worker starts");
        assert!(worker.send(Request::Inject(fault)).is_ok());
    }

    #[test]
    fn test_worker_panic_falls_back() {
        let mut coordinator = OffloadCoordinator::new(config(true, 100));
        let records: Arc<[Record]> = Arc::from(synthetic_records(500, 5));
        let query = CatalogQuery::new()
            .search("chat")
            .sort(crate::query::SortSpec::desc(crate::query::SortField::LikeCount));
        let mut engine = CatalogEngine::default();
        let expected = engine.apply_query_to(&records, &query).unwrap();

        inject(&mut coordinator, Fault::Panic);
        let outcome = coordinator.run(&records, &query).unwrap();
        assert_eq!(outcome.dispatch, Dispatch::Fallback);
        assert_eq!(outcome.result.positions(), expected.positions());

        let stats = coordinator.stats();
        assert_eq!(stats.fallbacks, 1);
        assert_eq!(stats.worker.panics, 1);

        // The same worker keeps serving
        let outcome = coordinator.run(&records, &query).unwrap();
        assert_eq!(outcome.dispatch, Dispatch::Background);
        assert_eq!(outcome.result.positions(), expected.positions());
        let stats = coordinator.stats();
        assert_eq!(stats.background, 1);
        assert_eq!(stats.worker.jobs_run, 2);
    }

    #[test]
    fn test_worker_disconnect_falls_back() {
        let mut coordinator = OffloadCoordinator::new(config(true, 100));
        let records: Arc<[Record]> = Arc::from(synthetic_records(500, 6));
        let query = CatalogQuery::new().search("base");

        inject(&mut coordinator, Fault::DropReply);
        let outcome = coordinator.run(&records, &query).unwrap();
        assert_eq!(outcome.dispatch, Dispatch::Fallback);
        assert!(coordinator.worker.is_none());
        assert!(outcome.result.iter().all(|r| r.model_name.to_lowercase().contains("base")));

        // A fresh worker is started for the next submission
        let outcome = coordinator.run(&records, &query).unwrap();
        assert_eq!(outcome.dispatch, Dispatch::Background);
        assert_eq!(coordinator.stats().fallbacks, 1);
    }
}
