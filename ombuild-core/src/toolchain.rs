// ombuild-core/src/toolchain.rs
use std::path::{Path, PathBuf};

use ombuild_common::config::Config;
use ombuild_common::error::{OmbError, Result};
use tracing::debug;

/// Resolved executables for the external build tools.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub git: PathBuf,
    pub cmake: PathBuf,
    pub make: PathBuf,
}

impl Toolchain {
    /// Looks every tool up in `PATH` (or checks the explicit path) before any
    /// pipeline starts, so a missing tool fails the run once instead of per tag.
    pub fn resolve(config: &Config) -> Result<Self> {
        Ok(Self {
            git: find_tool("git", &config.git)?,
            cmake: find_tool("cmake", &config.cmake)?,
            make: find_tool("make", &config.make)?,
        })
    }
}

fn find_tool(name: &str, exe: &Path) -> Result<PathBuf> {
    let path = which::which(exe).map_err(|e| {
        OmbError::Config(format!(
            "{name} executable '{}' not found: {e}",
            exe.display()
        ))
    })?;
    debug!("Using {} at {}", name, path.display());
    Ok(path)
}
