//! Batch execution: independent runs in parallel on a rayon pool.
//!
//! Runs share nothing but the caller's sink registry. Results come back in
//! request order; one failed run never affects the others.

use std::sync::Arc;

use rayon::prelude::*;
use stratrun_core::{DiagnosticSink, SinkRegistry};
use tracing::info;

use crate::artifact::RunArtifact;
use crate::config::RunConfig;
use crate::orchestrator::{Orchestrator, RunError};
use crate::result::RunResult;

/// One run in a batch.
#[derive(Debug)]
pub struct RunRequest {
    pub config: RunConfig,
    pub artifact: RunArtifact,
    /// Sink category; defaults to the strategy id.
    pub category: Option<String>,
}

impl RunRequest {
    pub fn new(config: RunConfig, artifact: RunArtifact) -> Self {
        Self {
            config,
            artifact,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn sink(&self, registry: &SinkRegistry) -> Arc<dyn DiagnosticSink> {
        registry.sink(self.category.as_deref().unwrap_or(&self.config.strategy))
    }

    fn execute(self, registry: &SinkRegistry) -> Result<RunResult, RunError> {
        let sink = self.sink(registry);
        let mut orchestrator = Orchestrator::new(self.config, sink)?;
        orchestrator.run(self.artifact)
    }
}

/// Execute every request on the global rayon pool.
pub fn run_batch(requests: Vec<RunRequest>, registry: &SinkRegistry) -> Vec<Result<RunResult, RunError>> {
    run_batch_with_progress(requests, registry, |_, _, _| {})
}

/// Execute every request on a dedicated pool of `threads` workers.
pub fn run_batch_with_threads(
    requests: Vec<RunRequest>,
    registry: &SinkRegistry,
    threads: usize,
) -> Result<Vec<Result<RunResult, RunError>>, rayon::ThreadPoolBuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("stratrun-batch-{i}"))
        .build()?;
    Ok(pool.install(|| run_batch(requests, registry)))
}

/// Like `run_batch`; the callback is invoked as each run completes with:
/// - index of the request (0-based)
/// - total number of requests
/// - the run's outcome
pub fn run_batch_with_progress<F>(
    requests: Vec<RunRequest>,
    registry: &SinkRegistry,
    progress_callback: F,
) -> Vec<Result<RunResult, RunError>>
where
    F: Fn(usize, usize, &Result<RunResult, RunError>) + Send + Sync,
{
    let total = requests.len();
    info!(runs = total, "batch started");

    let results: Vec<Result<RunResult, RunError>> = requests
        .into_par_iter()
        .enumerate()
        .map(|(idx, request)| {
            let outcome = request.execute(registry);
            progress_callback(idx, total, &outcome);
            outcome
        })
        .collect();

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(runs = total, failed, "batch finished");
    results
}
