use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::StepResult;

#[derive(Error, Debug, Clone)]
pub enum OmbError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Invalid tag '{0}': {1}")]
    InvalidTag(String, String),

    #[error("Working scope error: {0}")]
    Scope(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Fetch Error [{tag}]: `{}` failed with {}", .step.command_line(), .step.status)]
    Fetch { tag: String, step: StepResult },

    #[error("Patch Error [{tag}]: could not rewrite {}: {source}", .path.display())]
    Patch {
        tag: String,
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("Configure Error [{tag}]: `{}` failed with {}", .step.command_line(), .step.status)]
    Configure { tag: String, step: StepResult },

    #[error("Build Error [{tag}]: `{}` failed with {}", .step.command_line(), .step.status)]
    Build { tag: String, step: StepResult },

    #[error("Pipeline for '{tag}' was aborted: {reason}")]
    TaskAborted { tag: String, reason: String },
}

impl OmbError {
    /// The external command and exit status behind a failed step, if any.
    pub fn step(&self) -> Option<&StepResult> {
        match self {
            OmbError::Fetch { step, .. }
            | OmbError::Configure { step, .. }
            | OmbError::Build { step, .. } => Some(step),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OmbError {
    fn from(err: std::io::Error) -> Self {
        OmbError::Io(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, OmbError>;

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    use super::*;

    fn failed_step() -> StepResult {
        StepResult {
            command: vec![
                "git".to_string(),
                "clone".to_string(),
                "-b".to_string(),
                "v1.2.0".to_string(),
            ],
            status: ExitStatus::from_raw(128 << 8),
        }
    }

    #[test]
    fn fetch_error_names_tag_command_and_status() {
        let err = OmbError::Fetch {
            tag: "v1.2.0".to_string(),
            step: failed_step(),
        };
        let message = err.to_string();
        assert!(message.contains("[v1.2.0]"), "{message}");
        assert!(message.contains("`git clone -b v1.2.0`"), "{message}");
        assert!(message.contains("128"), "{message}");
        assert_eq!(err.step().and_then(|s| s.status.code()), Some(128));
    }

    #[test]
    fn patch_error_has_no_step() {
        let err = OmbError::Patch {
            tag: "v1.3.0".to_string(),
            path: PathBuf::from("/src/CMakeLists.txt"),
            source: Arc::new(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
        };
        assert!(err.step().is_none());
        assert!(err.to_string().contains("/src/CMakeLists.txt"));
    }
}
