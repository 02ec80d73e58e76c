//! Execution harness for compiler-touching work.
//!
//! The front end keeps process-wide mutable tables, so everything that may
//! compile runs on ONE sequential worker thread; that is a correctness
//! requirement, not a tuning choice. Callers never block on the worker:
//! they poll a completion slot at a short interval, giving up when their
//! cancel token fires or their ceiling elapses. Giving up abandons the
//! wait, not the computation; the worker finishes (or panics harmlessly
//! into the slot) and moves on to the next job unpoisoned.
//!
//! Work that does not touch compiler state (publishing diagnostics, temp
//! files, external processes) goes to [`Worker::run_in_background`], an
//! unbounded pool of plain threads.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::cache::panic_message;

/// Cooperative cancellation flag shared between a caller and its request.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_fired(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a tracked computation produced no value. `Cancelled` and
/// `DeadlineExceeded` are distinct on purpose: the protocol layer drops
/// the response for the former and may warn or retry for the latter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    Cancelled,
    DeadlineExceeded,
    Internal(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Cancelled => write!(f, "request cancelled"),
            QueryError::DeadlineExceeded => write!(f, "max execution time exceeded"),
            QueryError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}

type JobResult<T> = Result<T, String>;

/// Completion slot for one submitted job.
pub struct Pending<T> {
    slot: Arc<Mutex<Option<JobResult<T>>>>,
}

impl<T> Pending<T> {
    pub fn try_take(&self) -> Option<JobResult<T>> {
        self.slot.lock().take()
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// The single sequential worker plus the background pool entry point.
pub struct Worker {
    sender: mpsc::Sender<Job>,
}

impl Worker {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name("lume-compiler-worker".to_string())
            .spawn(move || {
                // Jobs trap their own panics; this loop only ends when the
                // sender side is dropped.
                for job in receiver {
                    job();
                }
            })
            .expect("spawning the compiler worker");
        Self { sender }
    }

    /// Queue `f` on the sequential worker and return its completion slot.
    /// Jobs run strictly in submission order.
    pub fn submit<T, F>(&self, f: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let out = Arc::clone(&slot);
        let job: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(f)).map_err(|p| panic_message(&*p));
            *out.lock() = Some(result);
        });
        if self.sender.send(job).is_err() {
            tracing::error!("compiler worker is gone; job dropped");
        }
        Pending { slot }
    }

    /// Run `f` on the worker, polling every `poll_interval` until it
    /// completes, `cancel` fires, or `ceiling` elapses.
    ///
    /// Cancellation and the ceiling stop the WAIT only. The interrupt is
    /// best effort: a closure that wants to stop early must capture and
    /// check the token itself; compiler code does not. The test for this
    /// contract is isolation, not promptness: an abandoned job must not
    /// corrupt the job after it.
    pub fn run_tracked<T, F>(
        &self,
        cancel: &CancelToken,
        poll_interval: Duration,
        ceiling: Duration,
        f: F,
    ) -> Result<T, QueryError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let pending = self.submit(f);
        let started = Instant::now();
        loop {
            if let Some(result) = pending.try_take() {
                return result.map_err(QueryError::Internal);
            }
            if cancel.is_fired() {
                return Err(QueryError::Cancelled);
            }
            if started.elapsed() >= ceiling {
                return Err(QueryError::DeadlineExceeded);
            }
            thread::sleep(poll_interval);
        }
    }

    /// Fire-and-forget work that must not occupy the sequential worker.
    pub fn run_in_background<F>(f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = thread::Builder::new()
            .name("lume-background".to_string())
            .spawn(f)
        {
            tracing::error!(error = %e, "failed to spawn background thread");
        }
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(5);
    const PLENTY: Duration = Duration::from_secs(5);

    #[test]
    fn tracked_work_returns_its_value() {
        let worker = Worker::new();
        let result = worker.run_tracked(&CancelToken::new(), POLL, PLENTY, || 6 * 7);
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn jobs_run_in_submission_order() {
        let worker = Worker::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pendings = Vec::new();
        for i in 0..8 {
            let log = Arc::clone(&log);
            pendings.push(worker.submit(move || log.lock().push(i)));
        }
        for p in &pendings {
            while p.try_take().is_none() {
                thread::sleep(POLL);
            }
        }
        assert_eq!(*log.lock(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn ceiling_reports_deadline_exceeded() {
        let worker = Worker::new();
        let result = worker.run_tracked(&CancelToken::new(), POLL, Duration::from_millis(50), || {
            thread::sleep(Duration::from_millis(400));
            "late"
        });
        assert_eq!(result, Err(QueryError::DeadlineExceeded));
    }

    #[test]
    fn cancellation_is_distinct_from_timeout() {
        let worker = Worker::new();
        let cancel = CancelToken::new();
        cancel.fire();
        let result = worker.run_tracked(&cancel, POLL, PLENTY, || {
            thread::sleep(Duration::from_millis(200));
            "unwanted"
        });
        assert_eq!(result, Err(QueryError::Cancelled));
    }

    #[test]
    fn abandoned_job_does_not_poison_the_next_one() {
        let worker = Worker::new();
        let slow = worker.run_tracked(&CancelToken::new(), POLL, Duration::from_millis(30), || {
            thread::sleep(Duration::from_millis(300));
        });
        assert_eq!(slow, Err(QueryError::DeadlineExceeded));

        let fast = worker.run_tracked(&CancelToken::new(), POLL, PLENTY, || "healthy");
        assert_eq!(fast, Ok("healthy"));
    }

    #[test]
    fn panicking_job_is_an_internal_error_and_worker_survives() {
        let worker = Worker::new();
        let boom: Result<(), _> = worker.run_tracked(&CancelToken::new(), POLL, PLENTY, || {
            panic!("table corruption")
        });
        match boom {
            Err(QueryError::Internal(msg)) => assert!(msg.contains("table corruption")),
            other => panic!("expected internal error, got {other:?}"),
        }

        let after = worker.run_tracked(&CancelToken::new(), POLL, PLENTY, || 1 + 1);
        assert_eq!(after, Ok(2));
    }
}
