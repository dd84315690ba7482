use std::ffi::OsString;
use std::path::Path;

use ombuild_aio::process;
use ombuild_common::error::{OmbError, Result};
use ombuild_common::pipeline::Tag;
use tracing::info;

use crate::toolchain::Toolchain;

/// Release configuration installing into `install_prefix`, with separate
/// source and build trees so the source is never written to.
pub fn configure_args(source_dir: &Path, build_dir: &Path, install_prefix: &Path) -> Vec<OsString> {
    let mut prefix = OsString::from("-DCMAKE_INSTALL_PREFIX=");
    prefix.push(install_prefix);
    let mut source = OsString::from("-S=");
    source.push(source_dir);
    let mut build = OsString::from("-B=");
    build.push(build_dir);

    vec!["-DCMAKE_BUILD_TYPE=Release".into(), prefix, source, build]
}

/// Runs the CMake generator once, populating `build_dir`.
pub async fn configure(
    toolchain: &Toolchain,
    tag: &Tag,
    source_dir: &Path,
    build_dir: &Path,
    install_prefix: &Path,
) -> Result<()> {
    info!(
        "==> Running cmake configuration in {} (prefix {})",
        build_dir.display(),
        install_prefix.display()
    );
    process::run_step(
        &toolchain.cmake,
        &configure_args(source_dir, build_dir, install_prefix),
        None,
    )
    .await?
    .into_result(|step| OmbError::Configure {
        tag: tag.to_string(),
        step,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_arguments_match_the_generator_contract() {
        let args = configure_args(
            Path::new("/scope/src"),
            Path::new("/scope/build"),
            Path::new("/tmp/x/v1.3.0"),
        );
        assert_eq!(
            args,
            vec![
                OsString::from("-DCMAKE_BUILD_TYPE=Release"),
                OsString::from("-DCMAKE_INSTALL_PREFIX=/tmp/x/v1.3.0"),
                OsString::from("-S=/scope/src"),
                OsString::from("-B=/scope/build"),
            ]
        );
    }
}
