use crate::config::EngineConfig;
use crate::engine::{CatalogEngine, QueryResult};
use crate::offload::protocol::{Job, Request, Response};
#[cfg(test)]
use crate::offload::protocol::Fault;
use serde::Serialize;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

const WORKER_THREAD_NAME: &str = "modelcat-offload";

/// Counters maintained by the worker thread
#[derive(Default)]
pub(crate) struct WorkerStats {
    jobs_run: AtomicU64,
    jobs_skipped: AtomicU64,
    panics: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            jobs_run: self.jobs_run.load(Ordering::Relaxed),
            jobs_skipped: self.jobs_skipped.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub jobs_run: u64,
    pub jobs_skipped: u64,
    pub panics: u64,
}

/// Owning handle to a running worker thread
pub(crate) struct WorkerHandle {
    sender: Sender<Request>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Start a worker with its own engine instance
    pub(crate) fn spawn(
        config: EngineConfig,
        latest: Arc<AtomicU64>,
        stats: Arc<WorkerStats>,
    ) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop(receiver, config, latest, stats))?;

        tracing::debug!(target: "modelcat::offload", "Worker started");
        Ok(Self {
            sender,
            thread: Some(thread),
        })
    }

    /// Queue a request. Fails when the worker thread has exited.
    pub(crate) fn send(&self, request: Request) -> Result<(), Request> {
        self.sender.send(request).map_err(|e| e.0)
    }

    /// Ask the worker to exit without waiting for it. A job in progress
    /// finishes first and its reply is discarded.
    pub(crate) fn retire(mut self) {
        let _ = self.sender.send(Request::Shutdown);
        self.thread.take();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.sender.send(Request::Shutdown);
            let _ = thread.join();
        }
    }
}

fn worker_loop(
    receiver: Receiver<Request>,
    config: EngineConfig,
    latest: Arc<AtomicU64>,
    stats: Arc<WorkerStats>,
) {
    let mut engine = CatalogEngine::new(config);
    #[cfg(test)]
    let mut fault = None;

    while let Ok(request) = receiver.recv() {
        match request {
            Request::Shutdown => break,
            Request::Clear => engine.clear_caches(),
            #[cfg(test)]
            Request::Inject(next) => fault = Some(next),
            Request::Run(job) => {
                #[cfg(test)]
                if let Some(next) = fault.take() {
                    if let Some(response) = run_faulty_job(&mut engine, &job, &stats, next) {
                        let _ = job.reply.send(response);
                    }
                    continue;
                }

                let response = run_job(&mut engine, &job, &latest, &stats);
                // The coordinator may have stopped waiting
                let _ = job.reply.send(response);
            }
        }
    }

    tracing::debug!(target: "modelcat::offload", "Worker exiting");
}

fn run_job(
    engine: &mut CatalogEngine,
    job: &Job,
    latest: &AtomicU64,
    stats: &WorkerStats,
) -> Response {
    let newest = latest.load(Ordering::SeqCst);
    if job.seq < newest {
        stats.jobs_skipped.fetch_add(1, Ordering::Relaxed);
        return Response::Skipped {
            seq: job.seq,
            latest: newest,
        };
    }

    execute(engine, stats, job.seq, |engine| {
        engine.apply_query_to(&job.records, &job.query)
    })
}

/// Run `query` on the worker engine, turning errors and panics into
/// [`Response::Failed`]
fn execute<F>(engine: &mut CatalogEngine, stats: &WorkerStats, seq: u64, query: F) -> Response
where
    F: FnOnce(&mut CatalogEngine) -> crate::error::Result<QueryResult>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| query(engine)));
    stats.jobs_run.fetch_add(1, Ordering::Relaxed);

    match outcome {
        Ok(Ok(result)) => Response::Done { seq, result },
        Ok(Err(e)) => Response::Failed {
            seq,
            message: e.to_string(),
        },
        Err(payload) => {
            stats.panics.fetch_add(1, Ordering::Relaxed);
            // State may be half-updated; start the next job from scratch
            *engine = CatalogEngine::new(engine.config().clone());
            Response::Failed {
                seq,
                message: panic_message(payload.as_ref()),
            }
        }
    }
}

#[cfg(test)]
fn run_faulty_job(
    engine: &mut CatalogEngine,
    job: &Job,
    stats: &WorkerStats,
    fault: Fault,
) -> Option<Response> {
    match fault {
        Fault::DropReply => None,
        Fault::Panic => Some(execute(engine, stats, job.seq, |engine| {
            engine.apply_query_to(&job.records, &job.query)?;
            panic!("injected fault")
        })),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CatalogQuery;
    use crate::record::synthetic_records;

    #[test]
    fn test_worker_runs_and_skips() {
        let latest = Arc::new(AtomicU64::new(0));
        let stats = Arc::new(WorkerStats::default());
        let worker =
            WorkerHandle::spawn(EngineConfig::default(), latest.clone(), stats.clone()).unwrap();
        let records: Arc<[_]> = Arc::from(synthetic_records(100, 1));

        let (reply, rx) = mpsc::sync_channel(1);
        latest.store(1, Ordering::SeqCst);
        assert!(
            worker
                .send(Request::Run(Job {
                    seq: 1,
                    records: records.clone(),
                    query: CatalogQuery::new().search("llama"),
                    reply,
                }))
                .is_ok()
        );
        assert!(matches!(rx.recv().unwrap(), Response::Done { seq: 1, .. }));

        let (reply, rx) = mpsc::sync_channel(1);
        latest.store(5, Ordering::SeqCst);
        assert!(
            worker
                .send(Request::Run(Job {
                    seq: 2,
                    records,
                    query: CatalogQuery::new(),
                    reply,
                }))
                .is_ok()
        );
        assert!(matches!(
            rx.recv().unwrap(),
            Response::Skipped { seq: 2, latest: 5 }
        ));

        drop(worker);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.jobs_run, 1);
        assert_eq!(snapshot.jobs_skipped, 1);
        assert_eq!(snapshot.panics, 0);
    }

    #[test]
    fn test_panicking_job_resets_engine() {
        let latest = Arc::new(AtomicU64::new(0));
        let stats = Arc::new(WorkerStats::default());
        let worker =
            WorkerHandle::spawn(EngineConfig::default(), latest.clone(), stats.clone()).unwrap();
        let records: Arc<[_]> = Arc::from(synthetic_records(100, 2));

        assert!(worker.send(Request::Inject(Fault::Panic)).is_ok());
        for seq in 1..=2 {
            let (reply, rx) = mpsc::sync_channel(1);
            latest.store(seq, Ordering::SeqCst);
            assert!(
                worker
                    .send(Request::Run(Job {
                        seq,
                        records: records.clone(),
                        query: CatalogQuery::new().search("chat"),
                        reply,
                    }))
                    .is_ok()
            );
            match (seq, rx.recv().unwrap()) {
                (1, Response::Failed { message, .. }) => {
                    assert_eq!(message, "worker panicked: injected fault")
                }
                (2, Response::Done { result, .. }) => assert!(!result.from_cache),
                (_, other) => panic!("unexpected response {other:?}"),
            }
        }

        drop(worker);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.jobs_run, 2);
        assert_eq!(snapshot.panics, 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "worker panicked: boom");
    }
}
