use std::sync::Arc;

use ombuild_aio::WorkingScope;
use ombuild_common::error::Result;
use ombuild_common::pipeline::{
    BuildRequest, BuildState, BuildStep, JobOutcome, PipelineEvent, Tag,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::patch::PatchRule;
use crate::toolchain::Toolchain;
use crate::{build, fetch, patch};

/// Read-only state shared by every pipeline of one run.
pub(super) struct PipelineContext {
    pub repository_url: String,
    pub toolchain: Toolchain,
    pub rule: PatchRule,
    pub event_tx: broadcast::Sender<PipelineEvent>,
}

/// Runs one request to `Done` or `Failed`. Never returns an error: the
/// failure is recorded in the outcome so sibling pipelines are unaffected.
#[instrument(skip_all, fields(tag = %request.tag))]
pub(super) async fn execute_job(request: BuildRequest, ctx: Arc<PipelineContext>) -> JobOutcome {
    let mut state = BuildState::Pending;
    let result = do_execute_steps(&request, &ctx, &mut state).await;

    let state = match result {
        Ok(()) => {
            transition(&mut state, BuildState::Done);
            info!(
                "[{}] Installed into {}",
                request.tag,
                request.install_prefix.display()
            );
            let _ = ctx.event_tx.send(PipelineEvent::JobSuccess {
                tag: request.tag.to_string(),
                install_prefix: request.install_prefix.clone(),
            });
            state
        }
        Err(e) => {
            let step = state.step();
            match step {
                Some(step) => error!("[{}] Failed during {}: {}", request.tag, step, e),
                None => error!("[{}] Failed: {}", request.tag, e),
            }
            let _ = ctx
                .event_tx
                .send(PipelineEvent::job_failed(&request.tag, step, &e));
            let failed = BuildState::Failed(Arc::new(e));
            transition(&mut state, failed.clone());
            failed
        }
    };

    JobOutcome {
        tag: request.tag,
        install_prefix: request.install_prefix,
        state,
    }
}

async fn do_execute_steps(
    request: &BuildRequest,
    ctx: &PipelineContext,
    state: &mut BuildState,
) -> Result<()> {
    enter_step(state, BuildStep::Fetch, &request.tag, ctx);
    let scope = WorkingScope::acquire(request)?;

    let result = run_steps(request, ctx, state, &scope).await;
    release_scope(scope).await;
    result
}

async fn run_steps(
    request: &BuildRequest,
    ctx: &PipelineContext,
    state: &mut BuildState,
    scope: &WorkingScope,
) -> Result<()> {
    let tag = &request.tag;

    fetch::fetch_source(&ctx.toolchain, &ctx.repository_url, tag, scope.src_dir()).await?;

    enter_step(state, BuildStep::Patch, tag, ctx);
    let patched =
        patch::patch_tree_async(scope.src_dir().to_path_buf(), ctx.rule, tag.clone()).await?;
    for path in patched {
        let _ = ctx.event_tx.send(PipelineEvent::FilePatched {
            tag: tag.to_string(),
            path,
        });
    }

    enter_step(state, BuildStep::Configure, tag, ctx);
    let build_dir = scope.create_build_dir()?;
    build::configure(
        &ctx.toolchain,
        tag,
        scope.src_dir(),
        build_dir,
        &request.install_prefix,
    )
    .await?;

    enter_step(state, BuildStep::Build, tag, ctx);
    build::compile_and_install(&ctx.toolchain, tag, build_dir).await
}

fn enter_step(state: &mut BuildState, step: BuildStep, tag: &Tag, ctx: &PipelineContext) {
    transition(state, BuildState::running(step));
    let _ = ctx.event_tx.send(PipelineEvent::StepStarted {
        tag: tag.to_string(),
        step,
    });
}

fn transition(state: &mut BuildState, next: BuildState) {
    debug_assert!(
        state.can_transition_to(&next),
        "invalid transition {state:?} -> {next:?}"
    );
    debug!("{:?} -> {:?}", state, next);
    *state = next;
}

/// Source trees are large; delete them on the blocking pool. If the task is
/// cancelled before this point the scope's `Drop` still removes them.
async fn release_scope(scope: WorkingScope) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(scope)).await {
        warn!("Working scope cleanup task failed: {}", e);
    }
}
