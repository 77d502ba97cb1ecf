//! `gridpull run` – dispatch download jobs to the worker nodes.

use anyhow::Result;
use gridpull_core::config::GridpullConfig;
use gridpull_core::dispatch::{self, FailurePolicy};
use gridpull_core::fetch::GridSessionFactory;
use gridpull_core::worker::WorkerSpec;
use std::path::Path;
use std::sync::Arc;

pub fn run_scrape(
    mut cfg: GridpullConfig,
    output: &Path,
    nodes: Vec<String>,
    dataset: &str,
    data_dir: &str,
    retry_elsewhere: bool,
) -> Result<()> {
    if retry_elsewhere {
        cfg.failure_policy = FailurePolicy::RetryElsewhere;
    }

    let specs: Vec<WorkerSpec> = nodes.into_iter().map(WorkerSpec::new).collect();
    let dataset_url = cfg.dataset_url(dataset);
    tracing::info!(
        dataset,
        url = %dataset_url,
        workers = specs.len(),
        output = %output.display(),
        "starting run"
    );

    let factory = GridSessionFactory::new(cfg.clone(), dataset_url, output, data_dir);
    let summary = dispatch::run_pool(specs, Arc::new(factory), &cfg)?;

    println!(
        "Finished downloading: {} item(s) retrieved, {} worker failure(s), highest index {}.",
        summary.successes,
        summary.failures,
        summary
            .highest_index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}
