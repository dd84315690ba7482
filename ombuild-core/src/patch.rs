// ombuild-core/src/patch.rs
//! Redirects the retired bootstrap-sources download in the fetched CMake files.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ombuild_common::error::{OmbError, Result};
use ombuild_common::pipeline::Tag;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Exact-substring rewrite applied to every file with a matching name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRule {
    pub file_name: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

/// The OpenModelica bootstrap tarball moved from `omc/` to `old/`.
pub const BOOTSTRAP_SOURCES_RULE: PatchRule = PatchRule {
    file_name: "CMakeLists.txt",
    from: "https://build.openmodelica.org/omc/bootstrap/sources.tar.gz",
    to: "https://build.openmodelica.org/old/bootstrap/sources.tar.gz",
};

impl PatchRule {
    /// Replaces every occurrence of `from`. Borrows when there is nothing to do.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.contains(self.from) {
            Cow::Owned(text.replace(self.from, self.to))
        } else {
            Cow::Borrowed(text)
        }
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| name == self.file_name)
    }

    /// Rewrites one file in place. Returns whether the content changed.
    pub fn patch_file(&self, path: &Path) -> std::io::Result<bool> {
        let text = fs::read_to_string(path)?;
        match self.apply(&text) {
            Cow::Borrowed(_) => Ok(false),
            Cow::Owned(patched) => {
                fs::write(path, patched)?;
                Ok(true)
            }
        }
    }
}

/// Applies `rule` to every matching file under `root`, returning the files
/// that were rewritten. Files without a match are left untouched.
pub fn patch_tree(root: &Path, rule: &PatchRule, tag: &Tag) -> Result<Vec<PathBuf>> {
    let patch_error = |path: &Path, source: std::io::Error| OmbError::Patch {
        tag: tag.to_string(),
        path: path.to_path_buf(),
        source: Arc::new(source),
    };

    let mut rewritten = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            patch_error(&path, e.into())
        })?;
        if !entry.file_type().is_file() || !rule.matches(entry.path()) {
            continue;
        }
        if rule
            .patch_file(entry.path())
            .map_err(|e| patch_error(entry.path(), e))?
        {
            info!("Overwrite {}", entry.path().display());
            rewritten.push(entry.into_path());
        }
    }
    debug!(
        "Patched {} file(s) under {}",
        rewritten.len(),
        root.display()
    );
    Ok(rewritten)
}

/// [`patch_tree`] on the blocking pool, so sibling pipelines keep running.
pub async fn patch_tree_async(root: PathBuf, rule: PatchRule, tag: Tag) -> Result<Vec<PathBuf>> {
    let task_tag = tag.clone();
    tokio::task::spawn_blocking(move || patch_tree(&root, &rule, &task_tag))
        .await
        .map_err(|e| OmbError::TaskAborted {
            tag: tag.to_string(),
            reason: format!("patch task failed: {e}"),
        })?
}
