// ombuild-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::Result;
use crate::pipeline::Tag;

const DEFAULT_PREFIX_ROOT: &str = "/opt/OpenModelica";
const DEFAULT_REPOSITORY_URL: &str = "https://github.com/OpenModelica/OpenModelica.git";

#[derive(Debug, Clone)]
pub struct Config {
    pub prefix_root: PathBuf,
    pub repository_url: String,
    pub git: PathBuf,
    pub cmake: PathBuf,
    pub make: PathBuf,
    /// Parent directory for temporary working scopes. `None` uses the system temp dir.
    pub work_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading ombuild configuration");
        let config = Self::from_lookup(|key| env::var(key).ok());
        debug!("Configuration loaded successfully.");
        Ok(config)
    }

    /// Builds a configuration from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let prefix_root = var("OMBUILD_PREFIX").map(PathBuf::from).unwrap_or_else(|| {
            debug!(
                "OMBUILD_PREFIX not set or empty, falling back to default: {}",
                DEFAULT_PREFIX_ROOT
            );
            PathBuf::from(DEFAULT_PREFIX_ROOT)
        });
        debug!("Effective prefix root set to: {}", prefix_root.display());

        Self {
            prefix_root,
            repository_url: var("OMBUILD_REPOSITORY")
                .unwrap_or_else(|| DEFAULT_REPOSITORY_URL.to_string()),
            git: var("OMBUILD_GIT").map_or_else(|| PathBuf::from("git"), PathBuf::from),
            cmake: var("OMBUILD_CMAKE").map_or_else(|| PathBuf::from("cmake"), PathBuf::from),
            make: var("OMBUILD_MAKE").map_or_else(|| PathBuf::from("make"), PathBuf::from),
            work_dir: var("OMBUILD_WORK_DIR").map(PathBuf::from),
        }
    }

    pub fn prefix_root(&self) -> &Path {
        &self.prefix_root
    }

    /// Install destination for one tag: `<prefix_root>/<tag>`.
    pub fn install_prefix(&self, tag: &Tag) -> PathBuf {
        self.prefix_root.join(tag.as_str())
    }
}
