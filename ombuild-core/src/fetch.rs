// ombuild-core/src/fetch.rs
use std::ffi::OsString;
use std::path::Path;

use ombuild_aio::{fs, process};
use ombuild_common::error::{OmbError, Result};
use ombuild_common::pipeline::Tag;
use tracing::{debug, instrument};

use crate::toolchain::Toolchain;

/// `git clone --recursive -b <tag> <repository> <dest>`
pub fn clone_args(tag: &Tag, repository: &str, dest: &Path) -> Vec<OsString> {
    vec![
        "clone".into(),
        "--recursive".into(),
        "-b".into(),
        tag.as_str().into(),
        repository.into(),
        dest.as_os_str().to_owned(),
    ]
}

/// Clones `repository` with all submodules at exactly `tag` into `dest`.
///
/// `dest` must be absent or an empty directory. Cleaning up a partial clone is
/// left to the caller's working scope.
#[instrument(skip_all, fields(dest = %dest.display()))]
pub async fn fetch_source(
    toolchain: &Toolchain,
    repository: &str,
    tag: &Tag,
    dest: &Path,
) -> Result<()> {
    if !fs::is_absent_or_empty_dir(dest)? {
        return Err(OmbError::Scope(format!(
            "clone destination {} is not empty",
            dest.display()
        )));
    }

    debug!("Cloning {} at {}", repository, tag);
    process::run_step(&toolchain.git, &clone_args(tag, repository, dest), None)
        .await?
        .into_result(|step| OmbError::Fetch {
            tag: tag.to_string(),
            step,
        })
}
