//! Pure dispatch decisions: index allocation, retirement, termination.

use std::collections::BTreeSet;

use super::{FailurePolicy, JobIndex, JobResult, Outcome, WorkerId};

/// What the driver must do after one result has been absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    /// Success: put a fresh index on the job queue.
    Enqueue(JobIndex),
    /// Failure: retire the reporting worker; the index is not re-issued.
    Retire(WorkerId),
    /// Failure under [`FailurePolicy::RetryElsewhere`]: retire the worker
    /// and put its index back for the surviving workers.
    RetireAndRequeue(WorkerId, JobIndex),
}

/// Tracks live workers and the single monotonically increasing job-index
/// counter. One fresh index is issued per observed success, never more.
#[derive(Debug)]
pub struct DispatchState {
    live: BTreeSet<WorkerId>,
    next_index: JobIndex,
    outstanding: usize,
    successes: u64,
    failures: u64,
    policy: FailurePolicy,
}

impl DispatchState {
    pub fn new(worker_count: usize, policy: FailurePolicy) -> Self {
        Self {
            live: (0..worker_count).collect(),
            next_index: 0,
            outstanding: 0,
            successes: 0,
            failures: 0,
            policy,
        }
    }

    /// Issue the initial indices `0..k-1`, one distinct job per worker.
    /// Must be called exactly once, before any result is processed.
    pub fn seed(&mut self) -> Vec<JobIndex> {
        debug_assert_eq!(self.next_index, 0, "seed called twice");
        let k = self.live.len() as JobIndex;
        self.next_index = k;
        self.outstanding = self.live.len();
        (0..k).collect()
    }

    /// Absorb one result and decide what the driver does next.
    pub fn on_result(&mut self, result: JobResult) -> DispatchAction {
        self.outstanding -= 1;
        match result.outcome {
            Outcome::Success => {
                self.successes += 1;
                let fresh = self.next_index;
                self.next_index += 1;
                self.outstanding += 1;
                DispatchAction::Enqueue(fresh)
            }
            Outcome::Failure => {
                self.failures += 1;
                self.live.remove(&result.worker);
                if self.policy == FailurePolicy::RetryElsewhere && !self.live.is_empty() {
                    self.outstanding += 1;
                    DispatchAction::RetireAndRequeue(result.worker, result.index)
                } else {
                    DispatchAction::Retire(result.worker)
                }
            }
        }
    }

    /// The run is over once every worker has retired.
    pub fn is_done(&self) -> bool {
        self.live.is_empty()
    }

    pub fn live_workers(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, worker: WorkerId) -> bool {
        self.live.contains(&worker)
    }

    /// Jobs issued but not yet resulted. Never exceeds the live worker
    /// count: seeding issues one per worker and each success trades one
    /// result for one fresh index.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Highest index ever issued, or None before seeding a non-empty pool.
    pub fn highest_issued(&self) -> Option<JobIndex> {
        self.next_index.checked_sub(1)
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}
