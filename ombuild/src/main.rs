// ombuild/src/main.rs
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use ombuild_common::config::Config;
use tracing::level_filters::LevelFilter;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::CliArgs;

/// Exit code reported after Ctrl-C, as a shell would for SIGINT.
const INTERRUPTED_EXIT_CODE: u8 = 130;

fn init_logging(verbose_level: u8) {
    let level_filter = match verbose_level {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("OMBUILD_LOG")
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.verbose);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: Could not load config: {:#}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // Returning from main drops the runtime, which drops every pipeline task
    // still running; their working scopes and child processes go with them.
    tokio::select! {
        result = cli_args.run(config) => match result {
            Ok(()) => {
                debug!("Command completed successfully.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                debug!("Command failed: {:#}", e);
                eprintln!("{}: {:#}", "Error".red().bold(), e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; cancelling running pipelines.");
            eprintln!("{} Interrupted, removing working directories...", "Warning:".yellow());
            ExitCode::from(INTERRUPTED_EXIT_CODE)
        }
    }
}
