//! Per-tag fetch → patch → configure → build pipelines and their orchestration.

pub mod engine;
pub mod planner;
mod worker;

pub use engine::{first_failure, run_build, run_pipelines};
pub use planner::{plan_in_tree, plan_requests};
