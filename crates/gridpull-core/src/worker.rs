//! Worker lifecycle: one thread per remote automation node, each owning an
//! exclusive session. A worker claims at most one job at a time from the
//! shared queue and exits on its first failed job, matching the
//! dispatcher's one-strike retirement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use url::Url;

use crate::dispatch::{JobQueue, JobResult, Outcome, WorkerId};
use crate::error::InitError;
use crate::fetch::SessionFactory;

/// Description of one worker: the automation node it drives.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub node: String,
}

impl WorkerSpec {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }

    /// Endpoint of the node's WebDriver hub. Bare hostnames get the grid
    /// node convention `http://{host}:5555/wd/hub`; anything with a scheme
    /// is taken verbatim.
    pub fn hub_url(&self) -> Result<Url, InitError> {
        let raw = if self.node.contains("://") {
            self.node.clone()
        } else {
            format!("http://{}:5555/wd/hub", self.node)
        };
        Url::parse(&raw).map_err(|source| InitError::BadEndpoint {
            endpoint: self.node.clone(),
            source,
        })
    }
}

/// Where a worker is in its life. Logged, not shared: the dispatcher only
/// tracks live-or-retired through its own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Ready,
    Busy,
    Retired,
}

/// Dispatcher-side handle to a spawned worker.
///
/// Termination is cooperative: the abort token is checked at every poll
/// step, and the worker's session (with its remote browser) is released
/// when the thread drops it on the way out.
pub struct WorkerHandle {
    pub id: WorkerId,
    pub node: String,
    abort: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request termination. Idempotent: returns true only for the call
    /// that actually flipped the token.
    pub fn terminate(&self) -> bool {
        !self.abort.swap(true, Ordering::SeqCst)
    }

    /// Wait for the worker thread to exit. A panicked worker is treated as
    /// already gone.
    pub fn join(mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn one worker thread. The thread initializes its session, then polls
/// the job queue until it fails a job or is told to stop.
pub fn spawn_worker(
    id: WorkerId,
    spec: WorkerSpec,
    factory: Arc<dyn SessionFactory>,
    jobs: JobQueue,
    results: mpsc::Sender<JobResult>,
    poll_interval: Duration,
) -> std::io::Result<WorkerHandle> {
    let abort = Arc::new(AtomicBool::new(false));
    let node = spec.node.clone();
    let token = Arc::clone(&abort);
    let join = std::thread::Builder::new()
        .name(format!("gridpull-worker-{id}"))
        .spawn(move || worker_loop(id, spec, factory, jobs, results, token, poll_interval))?;
    Ok(WorkerHandle {
        id,
        node,
        abort,
        join: Some(join),
    })
}

fn worker_loop(
    id: WorkerId,
    spec: WorkerSpec,
    factory: Arc<dyn SessionFactory>,
    jobs: JobQueue,
    results: mpsc::Sender<JobResult>,
    abort: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    tracing::debug!(worker = id, node = %spec.node, state = ?WorkerState::Starting, "worker starting");

    let mut fetcher = match factory.connect(&spec) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            tracing::warn!(worker = id, node = %spec.node, error = %e, "session setup failed");
            fail_first_job(id, &jobs, &results, &abort, poll_interval, &e);
            return;
        }
    };

    tracing::debug!(worker = id, state = ?WorkerState::Ready, "worker ready");

    while !abort.load(Ordering::SeqCst) {
        let Some(index) = jobs.try_claim() else {
            std::thread::sleep(poll_interval);
            continue;
        };

        tracing::info!(worker = id, index, state = ?WorkerState::Busy, "processing item");
        let outcome = match fetcher.fetch(index) {
            Ok(()) => {
                tracing::info!(worker = id, index, "downloaded item");
                Outcome::Success
            }
            Err(e) => {
                tracing::warn!(worker = id, index, error = %e, "item failed");
                Outcome::Failure
            }
        };

        let _ = results.send(JobResult {
            index,
            worker: id,
            outcome,
        });

        if outcome == Outcome::Failure {
            break;
        }
    }

    tracing::debug!(worker = id, state = ?WorkerState::Retired, "worker exiting");
}

/// A worker whose session never came up still owes the dispatcher one
/// result: claim the next job and report it failed, so retirement goes
/// through the ordinary channel.
fn fail_first_job(
    id: WorkerId,
    jobs: &JobQueue,
    results: &mpsc::Sender<JobResult>,
    abort: &AtomicBool,
    poll_interval: Duration,
    error: &InitError,
) {
    while !abort.load(Ordering::SeqCst) {
        if let Some(index) = jobs.try_claim() {
            tracing::warn!(worker = id, index, error = %error, "failing job after setup error");
            let _ = results.send(JobResult {
                index,
                worker: id,
                outcome: Outcome::Failure,
            });
            return;
        }
        std::thread::sleep(poll_interval);
    }
}
