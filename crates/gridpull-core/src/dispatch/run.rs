//! Drive a worker pool to completion: spawn, seed, absorb results, and
//! guarantee every worker is terminated exactly once on every exit path.

use anyhow::{Context, Result};
use std::sync::mpsc;
use std::sync::Arc;

use crate::config::GridpullConfig;
use crate::fetch::SessionFactory;
use crate::worker::{spawn_worker, WorkerHandle, WorkerSpec};

use super::{DispatchAction, DispatchState, JobIndex, JobQueue};

/// Run-level counters for the final log line. Per-index outcomes are not
/// reported; failures were already logged where they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub successes: u64,
    pub failures: u64,
    pub highest_index: Option<JobIndex>,
}

/// Start one worker per spec and dispatch job indices until every worker
/// has retired. Any error escaping the loop propagates to the caller after
/// the pool has been torn down; the caller turns it into the exit status.
pub fn run_pool(
    specs: Vec<WorkerSpec>,
    factory: Arc<dyn SessionFactory>,
    cfg: &GridpullConfig,
) -> Result<RunSummary> {
    if specs.is_empty() {
        anyhow::bail!("no worker nodes given; nothing to dispatch to");
    }

    let jobs = JobQueue::new();
    let (results_tx, results_rx) = mpsc::channel();

    let mut handles: Vec<WorkerHandle> = Vec::with_capacity(specs.len());
    let mut state = DispatchState::new(specs.len(), cfg.failure_policy);
    let spawn_result: Result<()> = specs.into_iter().enumerate().try_for_each(|(id, spec)| {
        let handle = spawn_worker(
            id,
            spec,
            Arc::clone(&factory),
            jobs.clone(),
            results_tx.clone(),
            cfg.poll_interval(),
        )
        .with_context(|| format!("spawn worker {id}"))?;
        handles.push(handle);
        Ok(())
    });
    drop(results_tx);

    // Workers that failed to spawn never report; count them out up front
    // by driving only when every thread came up.
    let outcome = spawn_result.and_then(|()| {
        for index in state.seed() {
            jobs.push(index);
        }
        drive(&mut state, &jobs, &results_rx, &handles)
    });

    // Exactly-once teardown for live and retired workers alike, on the
    // success path and the error path.
    for handle in &handles {
        if handle.terminate() {
            tracing::debug!(worker = handle.id, node = %handle.node, "terminated at shutdown");
        }
    }
    for handle in handles {
        handle.join();
    }

    outcome?;
    tracing::info!(
        successes = state.successes(),
        failures = state.failures(),
        "finished downloading"
    );
    Ok(RunSummary {
        successes: state.successes(),
        failures: state.failures(),
        highest_index: state.highest_issued(),
    })
}

fn drive(
    state: &mut DispatchState,
    jobs: &JobQueue,
    results: &mpsc::Receiver<super::JobResult>,
    handles: &[WorkerHandle],
) -> Result<()> {
    while !state.is_done() {
        let result = results
            .recv()
            .context("result channel closed while workers were still live")?;
        tracing::debug!(
            index = result.index,
            worker = result.worker,
            outcome = ?result.outcome,
            "result received"
        );
        match state.on_result(result) {
            DispatchAction::Enqueue(index) => jobs.push(index),
            DispatchAction::Retire(worker) => {
                handles[worker].terminate();
                tracing::info!(worker, live = state.live_workers(), "worker retired");
            }
            DispatchAction::RetireAndRequeue(worker, index) => {
                handles[worker].terminate();
                jobs.push(index);
                tracing::info!(worker, index, "worker retired, index requeued");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::FailurePolicy;
    use crate::error::{DownloadError, InitError};
    use crate::fetch::ItemFetcher;
    use std::collections::HashMap;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn test_config(policy: FailurePolicy) -> GridpullConfig {
        let mut cfg = GridpullConfig::default();
        cfg.poll_interval_secs = 0; // poll hot in tests
        cfg.failure_policy = policy;
        cfg
    }

    /// Fetcher that follows a per-worker script of outcomes, then fails.
    struct ScriptedFetcher {
        outcomes: VecDeque<bool>,
        sessions_released: Arc<AtomicUsize>,
    }

    impl ItemFetcher for ScriptedFetcher {
        fn fetch(&mut self, index: u64) -> Result<(), DownloadError> {
            match self.outcomes.pop_front() {
                Some(true) => Ok(()),
                _ => Err(DownloadError::NeverStarted { index, attempts: 1 }),
            }
        }
    }

    impl Drop for ScriptedFetcher {
        fn drop(&mut self) {
            self.sessions_released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Scripts keyed by node name, so outcomes stay deterministic no matter
    /// which thread connects first.
    struct ScriptedFactory {
        scripts: Mutex<HashMap<String, Vec<bool>>>,
        sessions_released: Arc<AtomicUsize>,
    }

    impl ScriptedFactory {
        fn new(scripts: &[(&str, &[bool])]) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .iter()
                        .map(|(node, s)| (node.to_string(), s.to_vec()))
                        .collect(),
                ),
                sessions_released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SessionFactory for ScriptedFactory {
        fn connect(&self, spec: &WorkerSpec) -> Result<Box<dyn ItemFetcher>, InitError> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .remove(&spec.node)
                .ok_or_else(|| InitError::Session {
                    node: spec.node.clone(),
                    reason: "no script".to_string(),
                })?;
            Ok(Box::new(ScriptedFetcher {
                outcomes: script.into(),
                sessions_released: Arc::clone(&self.sessions_released),
            }))
        }
    }

    #[test]
    fn empty_pool_fails_fast() {
        let factory = Arc::new(ScriptedFactory::new(&[]));
        let err = run_pool(Vec::new(), factory, &test_config(FailurePolicy::TreatAsExhausted))
            .unwrap_err();
        assert!(err.to_string().contains("no worker nodes"));
    }

    #[test]
    fn single_worker_runs_until_first_failure() {
        let factory = Arc::new(ScriptedFactory::new(&[("a", &[true; 5][..])]));
        let released = Arc::clone(&factory.sessions_released);
        let summary = run_pool(
            vec![WorkerSpec::new("a")],
            factory,
            &test_config(FailurePolicy::TreatAsExhausted),
        )
        .unwrap();
        // Five successes then the script runs out: indices 0..=5 issued.
        assert_eq!(summary.successes, 5);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.highest_index, Some(5));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mixed_pool_counts_and_terminates() {
        // a fails its first job; b succeeds once then fails.
        let factory = Arc::new(ScriptedFactory::new(&[
            ("a", &[][..]),
            ("b", &[true][..]),
        ]));
        let released = Arc::clone(&factory.sessions_released);
        let summary = run_pool(
            vec![WorkerSpec::new("a"), WorkerSpec::new("b")],
            factory,
            &test_config(FailurePolicy::TreatAsExhausted),
        )
        .unwrap();
        assert_eq!(summary.successes, 1);
        assert_eq!(summary.failures, 2);
        // Seeded {0,1} plus one fresh index per success.
        assert_eq!(summary.highest_index, Some(2));
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn init_failure_surfaces_as_a_job_failure() {
        // Worker b has no script: connect fails, and its seeded job must
        // come back as a failure through the normal result channel.
        let factory = Arc::new(ScriptedFactory::new(&[("a", &[true, true][..])]));
        let summary = run_pool(
            vec![WorkerSpec::new("a"), WorkerSpec::new("b")],
            factory,
            &test_config(FailurePolicy::TreatAsExhausted),
        )
        .unwrap();
        assert_eq!(summary.successes, 2);
        assert_eq!(summary.failures, 2);
    }

    #[test]
    fn retry_elsewhere_still_terminates_when_all_fail() {
        let factory = Arc::new(ScriptedFactory::new(&[
            ("a", &[][..]),
            ("b", &[][..]),
        ]));
        let summary = run_pool(
            vec![WorkerSpec::new("a"), WorkerSpec::new("b")],
            factory,
            &test_config(FailurePolicy::RetryElsewhere),
        )
        .unwrap();
        assert_eq!(summary.successes, 0);
        assert_eq!(summary.failures, 2);
    }

    /// Fetcher that panics, taking its worker thread (and result sender)
    /// down without reporting.
    struct PanickingFactory;

    impl SessionFactory for PanickingFactory {
        fn connect(&self, _spec: &WorkerSpec) -> Result<Box<dyn ItemFetcher>, InitError> {
            struct P;
            impl ItemFetcher for P {
                fn fetch(&mut self, _index: u64) -> Result<(), DownloadError> {
                    panic!("worker crashed");
                }
            }
            Ok(Box::new(P))
        }
    }

    #[test]
    fn crashed_workers_surface_as_a_run_error() {
        let err = run_pool(
            vec![WorkerSpec::new("a")],
            Arc::new(PanickingFactory),
            &test_config(FailurePolicy::TreatAsExhausted),
        )
        .unwrap_err();
        assert!(err.to_string().contains("result channel closed"));
    }
}
