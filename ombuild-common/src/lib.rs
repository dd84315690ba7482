// ombuild-common/src/lib.rs
pub mod config;
pub mod error;
pub mod pipeline;

// Re-export key types
pub use config::Config;
pub use error::{OmbError, Result};
pub use pipeline::{BuildRequest, BuildState, BuildStep, JobOutcome, PipelineEvent, Tag};
