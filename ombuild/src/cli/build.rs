// ombuild/src/cli/build.rs

use std::path::PathBuf;

use clap::Args;
use ombuild_common::config::Config;
use ombuild_common::error::{OmbError, Result};
use ombuild_common::pipeline::{PipelineEvent, Tag};
use ombuild_core::pipeline::{plan_in_tree, plan_requests, run_build};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::cli::status;

const EVENT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[arg(required = true, value_name = "TAG")]
    tags: Vec<Tag>,

    #[arg(
        long,
        value_name = "DIR",
        conflicts_with = "in_tree",
        help = "Install-prefix root; each tag installs into <DIR>/<TAG> [default: $OMBUILD_PREFIX or /opt/OpenModelica]"
    )]
    prefix: Option<PathBuf>,

    #[arg(
        long,
        help = "Build a single tag in ./src/<TAG> and ./build/<TAG>, installing into ./<TAG>"
    )]
    in_tree: bool,

    #[arg(short, long, help = "Do not print per-tag progress")]
    quiet: bool,
}

impl BuildArgs {
    #[instrument(skip(self, config), fields(tags = ?self.tags))]
    pub async fn run(&self, mut config: Config) -> Result<()> {
        if let Some(prefix) = &self.prefix {
            config.prefix_root = prefix.clone();
        }
        // cmake resolves a relative install prefix against the build directory.
        config.prefix_root = std::path::absolute(&config.prefix_root)?;

        let requests = if self.in_tree {
            let [tag] = self.tags.as_slice() else {
                return Err(OmbError::Config(
                    "--in-tree builds exactly one tag".to_string(),
                ));
            };
            let base = std::env::current_dir()?;
            vec![plan_in_tree(tag.clone(), &base)]
        } else {
            plan_requests(&self.tags, &config)?
        };
        debug!("Planned {} build request(s)", requests.len());

        let (event_tx, _) = broadcast::channel::<PipelineEvent>(EVENT_CHANNEL_SIZE);
        let status_handle =
            (!self.quiet).then(|| tokio::spawn(status::handle_events(event_tx.subscribe())));

        let result = run_build(requests, &config, event_tx).await;

        if let Some(handle) = status_handle {
            let _ = handle.await;
        }
        result
    }
}
