// ombuild/src/cli.rs
//! Defines the command-line argument structure using clap.
use clap::{ArgAction, Parser};
use ombuild_common::config::Config;
use ombuild_common::error::Result;

pub mod build;
pub mod status;

use crate::cli::build::BuildArgs;

/// Clone, patch, configure and install OpenModelica for one or more tags concurrently.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "ombuild", bin_name = "ombuild")]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub build: BuildArgs,
}

impl CliArgs {
    pub async fn run(&self, config: Config) -> Result<()> {
        self.build.run(config).await
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn accepts_prefix_and_several_tags() {
        let args = CliArgs::try_parse_from(["ombuild", "--prefix", "/tmp/x", "v1.2.0", "v1.3.0"])
            .unwrap();
        assert_eq!(args.verbose, 0);
        assert!(format!("{:?}", args.build).contains("v1.3.0"));
    }

    #[test]
    fn rejects_missing_tags_and_in_tree_with_prefix() {
        assert!(CliArgs::try_parse_from(["ombuild"]).is_err());
        assert!(CliArgs::try_parse_from(["ombuild", "--in-tree", "--prefix", "/x", "v1"]).is_err());
        assert!(CliArgs::try_parse_from(["ombuild", "-vv", "--in-tree", "v1.3.0"]).is_ok());
    }

    #[test]
    fn rejects_empty_tag() {
        assert!(CliArgs::try_parse_from(["ombuild", ""]).is_err());
    }
}
