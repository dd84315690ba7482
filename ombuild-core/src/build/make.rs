use std::ffi::OsString;
use std::path::Path;

use ombuild_aio::process;
use ombuild_common::error::{OmbError, Result};
use ombuild_common::pipeline::Tag;
use tracing::info;

use crate::toolchain::Toolchain;

/// Parallel jobs per build, independent of the host's core count. Several
/// tags build at once, so this bounds the total load rather than using every core.
pub const BUILD_JOBS: usize = 4;

/// `make -C<build_dir> -j4 install`
pub fn make_install_args(build_dir: &Path) -> Vec<OsString> {
    let mut dir = OsString::from("-C");
    dir.push(build_dir);
    vec![dir, format!("-j{BUILD_JOBS}").into(), "install".into()]
}

/// Compiles every target in `build_dir` and installs into the configured prefix.
pub async fn compile_and_install(toolchain: &Toolchain, tag: &Tag, build_dir: &Path) -> Result<()> {
    info!("==> Running make install in {}", build_dir.display());
    process::run_step(&toolchain.make, &make_install_args(build_dir), None)
        .await?
        .into_result(|step| OmbError::Build {
            tag: tag.to_string(),
            step,
        })
}
