// ombuild/src/cli/status.rs
use std::collections::HashMap;
use std::time::Instant;

use colored::*;
use ombuild_common::pipeline::{BuildStep, PipelineEvent};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStatus {
    Fetching,
    Patching,
    Configuring,
    Building,
    Success,
    Failed,
}

impl JobStatus {
    fn from_step(step: BuildStep) -> Self {
        match step {
            BuildStep::Fetch => JobStatus::Fetching,
            BuildStep::Patch => JobStatus::Patching,
            BuildStep::Configure => JobStatus::Configuring,
            BuildStep::Build => JobStatus::Building,
        }
    }

    fn display_state(&self) -> &'static str {
        match self {
            JobStatus::Fetching => "fetching",
            JobStatus::Patching => "patching",
            JobStatus::Configuring => "configuring",
            JobStatus::Building => "building",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }

    fn slot_indicator(&self) -> String {
        match self {
            JobStatus::Fetching => " ↓".yellow().to_string(),
            JobStatus::Patching => " ✎".cyan().to_string(),
            JobStatus::Configuring => " ⚙".blue().to_string(),
            JobStatus::Building => " ⚙".magenta().to_string(),
            JobStatus::Success => " ✓".green().bold().to_string(),
            JobStatus::Failed => " ✗".red().bold().to_string(),
        }
    }

    fn colored_state(&self) -> ColoredString {
        match self {
            JobStatus::Fetching => self.display_state().yellow(),
            JobStatus::Patching => self.display_state().cyan(),
            JobStatus::Configuring => self.display_state().blue(),
            JobStatus::Building => self.display_state().magenta(),
            JobStatus::Success => self.display_state().green().bold(),
            JobStatus::Failed => self.display_state().red().bold(),
        }
    }
}

struct JobInfo {
    status: JobStatus,
    start_time: Instant,
}

impl JobInfo {
    fn elapsed_str(&self) -> String {
        format!("{:.1}s", self.start_time.elapsed().as_secs_f64())
    }
}

struct StatusDisplay {
    jobs: HashMap<String, JobInfo>,
    job_order: Vec<String>,
}

impl StatusDisplay {
    fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            job_order: Vec::new(),
        }
    }

    fn set_status(&mut self, tag: &str, status: JobStatus) {
        match self.jobs.get_mut(tag) {
            Some(job) => job.status = status,
            None => {
                self.job_order.push(tag.to_string());
                self.jobs.insert(
                    tag.to_string(),
                    JobInfo {
                        status,
                        start_time: Instant::now(),
                    },
                );
            }
        }
        if let Some(job) = self.jobs.get(tag) {
            println!(
                "{} {} {} {}",
                status.slot_indicator(),
                tag.bold(),
                status.colored_state(),
                job.elapsed_str().dimmed()
            );
        }
    }

    /// Returns true once the pipeline has finished.
    fn handle(&mut self, event: PipelineEvent) -> bool {
        match event {
            PipelineEvent::PipelineStarted { total_jobs } => {
                println!(
                    "{}{}",
                    "==> ".bold().blue(),
                    format!("Building {total_jobs} tag(s)").bold()
                );
            }
            PipelineEvent::StepStarted { tag, step } => {
                self.set_status(&tag, JobStatus::from_step(step));
            }
            PipelineEvent::FilePatched { path, .. } => {
                println!("    {} {}", "patched".dimmed(), path.display());
            }
            PipelineEvent::JobSuccess {
                tag,
                install_prefix,
            } => {
                self.set_status(&tag, JobStatus::Success);
                println!("    {} {}", "installed into".dimmed(), install_prefix.display());
            }
            PipelineEvent::JobFailed { tag, step, error } => {
                self.set_status(&tag, JobStatus::Failed);
                let step = step.map(|s| format!(" during {s}")).unwrap_or_default();
                println!("    {}{}: {}", "error".red(), step, error);
            }
            PipelineEvent::PipelineFinished {
                duration_secs,
                success_count,
                fail_count,
            } => {
                self.print_summary(duration_secs, success_count, fail_count);
                return true;
            }
        }
        false
    }

    fn print_summary(&self, duration_secs: f64, success_count: usize, fail_count: usize) {
        println!(
            "{}{}",
            "==> ".bold().blue(),
            format!(
                "{success_count} succeeded, {fail_count} failed in {duration_secs:.1}s"
            )
            .bold()
        );
        for tag in &self.job_order {
            if let Some(job) = self.jobs.get(tag) {
                println!(
                    "{} {:<24} {}",
                    job.status.slot_indicator(),
                    tag,
                    job.status.colored_state()
                );
            }
        }
    }
}

/// Prints pipeline progress until the pipeline finishes or the channel closes.
pub async fn handle_events(mut event_rx: broadcast::Receiver<PipelineEvent>) {
    let mut display = StatusDisplay::new();
    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if display.handle(event) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!("Status display skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
