// ombuild-common/src/pipeline.rs
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{OmbError, Result};

// --- Requests ---

/// A version-control reference to build, e.g. `v1.23.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(OmbError::InvalidTag(tag, "tag is empty".to_string()));
        }
        if tag.starts_with('-') {
            return Err(OmbError::InvalidTag(
                tag,
                "tag must not start with '-'".to_string(),
            ));
        }
        if tag.chars().any(char::is_whitespace) {
            return Err(OmbError::InvalidTag(
                tag,
                "tag must not contain whitespace".to_string(),
            ));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Tag {
    type Err = OmbError;

    fn from_str(s: &str) -> Result<Self> {
        Tag::new(s)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a pipeline keeps its fetched source and build metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeLayout {
    /// A fresh temporary directory, optionally created under the given parent.
    Temporary { parent: Option<PathBuf> },
    /// Fixed `src/<tag>` and `build/<tag>` directories under the given base.
    InTree { base: PathBuf },
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub tag: Tag,
    pub install_prefix: PathBuf,
    pub layout: ScopeLayout,
}

// --- Pipeline steps and states ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Fetch,
    Patch,
    Configure,
    Build,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStep::Fetch => "fetch",
            BuildStep::Patch => "patch",
            BuildStep::Configure => "configure",
            BuildStep::Build => "build",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one pipeline. Transitions only move forward.
#[derive(Debug, Clone)]
pub enum BuildState {
    Pending,
    Fetching,
    Patching,
    Configuring,
    Building,
    Done,
    /// Terminal. Arc for cheap cloning.
    Failed(Arc<OmbError>),
}

impl BuildState {
    /// The state a pipeline is in while running `step`.
    pub fn running(step: BuildStep) -> Self {
        match step {
            BuildStep::Fetch => BuildState::Fetching,
            BuildStep::Patch => BuildState::Patching,
            BuildStep::Configure => BuildState::Configuring,
            BuildStep::Build => BuildState::Building,
        }
    }

    pub fn step(&self) -> Option<BuildStep> {
        match self {
            BuildState::Fetching => Some(BuildStep::Fetch),
            BuildState::Patching => Some(BuildStep::Patch),
            BuildState::Configuring => Some(BuildStep::Configure),
            BuildState::Building => Some(BuildStep::Build),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            BuildState::Pending => 0,
            BuildState::Fetching => 1,
            BuildState::Patching => 2,
            BuildState::Configuring => 3,
            BuildState::Building => 4,
            BuildState::Done | BuildState::Failed(_) => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed(_))
    }

    /// `Failed` is reachable only from an active step; everything else moves
    /// exactly one state forward.
    pub fn can_transition_to(&self, next: &BuildState) -> bool {
        match next {
            BuildState::Failed(_) => self.step().is_some(),
            _ => !self.is_terminal() && next.rank() == self.rank() + 1,
        }
    }
}

/// Outcome of one external process invocation.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub command: Vec<String>,
    pub status: ExitStatus,
}

impl StepResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// `Ok` on a zero exit status, otherwise the error built by `into_error`.
    pub fn into_result(self, into_error: impl FnOnce(StepResult) -> OmbError) -> Result<()> {
        if self.success() {
            Ok(())
        } else {
            Err(into_error(self))
        }
    }
}

/// Final state of one pipeline as seen by the orchestrator.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub tag: Tag,
    pub install_prefix: PathBuf,
    pub state: BuildState,
}

impl JobOutcome {
    pub fn error(&self) -> Option<&OmbError> {
        match &self.state {
            BuildState::Failed(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.state, BuildState::Done)
    }
}

// --- Events ---

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PipelineStarted {
        total_jobs: usize,
    },
    PipelineFinished {
        duration_secs: f64,
        success_count: usize,
        fail_count: usize,
    },
    StepStarted {
        tag: String,
        step: BuildStep,
    },
    FilePatched {
        tag: String,
        path: PathBuf,
    },
    JobSuccess {
        tag: String,
        install_prefix: PathBuf,
    },
    JobFailed {
        tag: String,
        step: Option<BuildStep>,
        error: String,
    },
}

impl PipelineEvent {
    pub fn job_failed(tag: &Tag, step: Option<BuildStep>, error: &OmbError) -> Self {
        PipelineEvent::JobFailed {
            tag: tag.to_string(),
            step,
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;

    use super::*;

    #[test]
    fn tags_reject_empty_flags_and_whitespace() {
        assert!("v1.22.0".parse::<Tag>().is_ok());
        assert!("release/1.0".parse::<Tag>().is_ok());
        assert!(matches!(Tag::new(""), Err(OmbError::InvalidTag(..))));
        assert!(matches!(Tag::new("--depth"), Err(OmbError::InvalidTag(..))));
        assert!(matches!(Tag::new("v1 2"), Err(OmbError::InvalidTag(..))));
    }

    #[test]
    fn states_only_move_forward() {
        let failure = BuildState::Failed(Arc::new(OmbError::Config("x".to_string())));

        assert!(BuildState::Pending.can_transition_to(&BuildState::Fetching));
        assert!(BuildState::Fetching.can_transition_to(&BuildState::Patching));
        assert!(BuildState::Building.can_transition_to(&BuildState::Done));
        assert!(BuildState::Configuring.can_transition_to(&failure));

        assert!(!BuildState::Pending.can_transition_to(&BuildState::Configuring));
        assert!(!BuildState::Patching.can_transition_to(&BuildState::Fetching));
        assert!(!BuildState::Pending.can_transition_to(&failure));
        assert!(!BuildState::Done.can_transition_to(&failure));
        assert!(!failure.can_transition_to(&BuildState::Done));
    }

    #[test]
    fn running_state_round_trips_through_step() {
        for step in [
            BuildStep::Fetch,
            BuildStep::Patch,
            BuildStep::Configure,
            BuildStep::Build,
        ] {
            assert_eq!(BuildState::running(step).step(), Some(step));
        }
        assert_eq!(BuildState::Done.step(), None);
    }

    #[test]
    fn step_result_maps_nonzero_exit_to_error() {
        let ok = StepResult {
            command: vec!["make".to_string(), "install".to_string()],
            status: ExitStatus::from_raw(0),
        };
        assert!(ok.into_result(|_| unreachable!()).is_ok());

        let failed = StepResult {
            command: vec!["make".to_string(), "install".to_string()],
            status: ExitStatus::from_raw(2 << 8),
        };
        let err = failed
            .into_result(|step| OmbError::Build {
                tag: "v1.3.0".to_string(),
                step,
            })
            .unwrap_err();
        let step = err.step().unwrap();
        assert_eq!(step.command_line(), "make install");
        assert_eq!(step.status.code(), Some(2));
    }
}
