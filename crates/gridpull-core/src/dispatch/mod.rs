//! Job dispatcher: issues sequential job indices to a pool of workers,
//! retires workers on their first failure, and ends the run once every
//! worker has retired (the source of items is taken to be exhausted).
//!
//! The decision logic lives in [`state::DispatchState`], free of threads
//! and channels; [`run::run_pool`] drives it against a real worker pool.

mod queue;
mod run;
mod state;

use serde::{Deserialize, Serialize};

pub use queue::JobQueue;
pub use run::{run_pool, RunSummary};
pub use state::{DispatchAction, DispatchState};

/// Index of one unit of work (one item to retrieve). Issued exactly once,
/// in strictly increasing order, by the dispatcher alone.
pub type JobIndex = u64;

/// Position of a worker in the pool; doubles as its identity in results.
pub type WorkerId = usize;

/// Boolean-shaped outcome of one processed job. Typed errors are logged and
/// collapsed to `Failure` on the worker side before reaching the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// One processed job as reported on the shared result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobResult {
    pub index: JobIndex,
    pub worker: WorkerId,
    pub outcome: Outcome,
}

/// What a worker failure means for the index it was processing.
///
/// The source treats the first failure of every worker as the natural
/// end-of-data signal and never re-issues the failed index; `RetryElsewhere`
/// instead hands the index to the surviving workers, for deployments where
/// failures are transient rather than "the dataset ran out".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Retire the worker, drop the index (source-compatible).
    #[default]
    #[serde(rename = "exhausted")]
    TreatAsExhausted,
    /// Retire the worker, re-queue the index while live workers remain.
    #[serde(rename = "retry")]
    RetryElsewhere,
}
