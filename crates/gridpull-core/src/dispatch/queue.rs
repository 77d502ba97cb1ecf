//! Shared job queue: the only coordination point between the dispatcher
//! (producer) and the worker pool (consumers).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::JobIndex;

/// FIFO of pending job indices. Cloning shares the underlying queue.
///
/// Workers claim with a non-blocking pop and sleep between empty polls;
/// the dispatcher pushes one index per observed success. At-most one
/// worker ever claims a given index because `try_claim` pops under the
/// lock.
#[derive(Clone, Default)]
pub struct JobQueue {
    inner: Arc<Mutex<VecDeque<JobIndex>>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job index for the next free worker.
    pub fn push(&self, index: JobIndex) {
        self.inner.lock().unwrap().push_back(index);
    }

    /// Claim the oldest pending index, if any. Never blocks.
    pub fn try_claim(&self) -> Option<JobIndex> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Number of pending (unclaimed) jobs.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
