use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use ombuild_common::config::Config;
use ombuild_common::error::{OmbError, Result};
use ombuild_common::pipeline::{BuildRequest, BuildState, JobOutcome, PipelineEvent, Tag};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use super::worker::{self, PipelineContext};
use crate::patch::BOOTSTRAP_SOURCES_RULE;
use crate::toolchain::Toolchain;

/// A spawned pipeline. Dropping it aborts the task, which in turn drops the
/// task's working scope and kills its running child process.
struct PipelineHandle {
    tag: Tag,
    install_prefix: PathBuf,
    handle: JoinHandle<JobOutcome>,
}

impl PipelineHandle {
    fn spawn(request: BuildRequest, ctx: Arc<PipelineContext>) -> Self {
        debug!("[{}] Dispatching pipeline", request.tag);
        Self {
            tag: request.tag.clone(),
            install_prefix: request.install_prefix.clone(),
            handle: tokio::spawn(worker::execute_job(request, ctx)),
        }
    }

    /// Waits for the pipeline. A task that panicked or was aborted is recorded
    /// as a failure of its own tag.
    async fn settle(mut self, event_tx: &broadcast::Sender<PipelineEvent>) -> JobOutcome {
        match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!("[{}] Pipeline task ended abnormally: {}", self.tag, join_error);
                let error = OmbError::TaskAborted {
                    tag: self.tag.to_string(),
                    reason: join_error.to_string(),
                };
                let _ = event_tx.send(PipelineEvent::job_failed(&self.tag, None, &error));
                JobOutcome {
                    tag: self.tag.clone(),
                    install_prefix: self.install_prefix.clone(),
                    state: BuildState::Failed(Arc::new(error)),
                }
            }
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Launches one pipeline per request and waits for every one of them to
/// settle. Outcomes are returned in request order; a failing pipeline never
/// cancels its siblings.
#[instrument(skip_all, fields(jobs = requests.len()))]
pub async fn run_pipelines(
    requests: Vec<BuildRequest>,
    config: &Config,
    toolchain: Toolchain,
    event_tx: broadcast::Sender<PipelineEvent>,
) -> Vec<JobOutcome> {
    let start_time = Instant::now();
    let total_jobs = requests.len();
    let _ = event_tx.send(PipelineEvent::PipelineStarted { total_jobs });

    let ctx = Arc::new(PipelineContext {
        repository_url: config.repository_url.clone(),
        toolchain,
        rule: BOOTSTRAP_SOURCES_RULE,
        event_tx: event_tx.clone(),
    });

    let handles: Vec<PipelineHandle> = requests
        .into_iter()
        .map(|request| PipelineHandle::spawn(request, Arc::clone(&ctx)))
        .collect();

    let outcomes = join_all(handles.into_iter().map(|h| h.settle(&event_tx))).await;

    let success_count = outcomes.iter().filter(|o| o.succeeded()).count();
    let fail_count = outcomes.len() - success_count;
    let duration_secs = start_time.elapsed().as_secs_f64();
    info!(
        "{} of {} pipeline(s) succeeded in {:.1}s",
        success_count, total_jobs, duration_secs
    );
    let _ = event_tx.send(PipelineEvent::PipelineFinished {
        duration_secs,
        success_count,
        fail_count,
    });
    outcomes
}

/// The first failure in request order, after logging every failure.
pub fn first_failure(outcomes: &[JobOutcome]) -> Result<()> {
    let mut failures = outcomes.iter().filter_map(|o| o.error().map(|e| (&o.tag, e)));
    let Some((_, first)) = failures.next() else {
        return Ok(());
    };
    for (tag, e) in failures {
        error!("[{}] Also failed: {}", tag, e);
    }
    Err(first.clone())
}

/// Resolves the toolchain, runs every request, and surfaces the first failure.
///
/// A missing tool fails before any pipeline is launched.
pub async fn run_build(
    requests: Vec<BuildRequest>,
    config: &Config,
    event_tx: broadcast::Sender<PipelineEvent>,
) -> Result<()> {
    let toolchain = Toolchain::resolve(config)?;
    let outcomes = run_pipelines(requests, config, toolchain, event_tx).await;
    first_failure(&outcomes)
}
