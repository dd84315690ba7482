// ombuild-aio/src/scope.rs
//! Per-pipeline working directories that are removed on every exit path.

use std::path::{Path, PathBuf};

use ombuild_common::error::{OmbError, Result};
use ombuild_common::pipeline::{BuildRequest, ScopeLayout, Tag};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::fs;

/// Fetched source (`src`) and generated build metadata (`build`) for one
/// pipeline.
///
/// Dropping the scope deletes both trees, whether the pipeline finished,
/// failed, or its task was cancelled. The install prefix is never touched.
#[derive(Debug)]
pub struct WorkingScope {
    temp_root: Option<TempDir>,
    src_dir: PathBuf,
    build_dir: PathBuf,
}

impl WorkingScope {
    pub fn acquire(request: &BuildRequest) -> Result<Self> {
        match &request.layout {
            ScopeLayout::Temporary { parent } => Self::temporary(parent.as_deref(), &request.tag),
            ScopeLayout::InTree { base } => Self::in_tree(base, &request.tag),
        }
    }

    /// A fresh directory with `src` and `build` inside it.
    pub fn temporary(parent: Option<&Path>, tag: &Tag) -> Result<Self> {
        let prefix = format!("ombuild-{}-", tag.as_str().replace('/', "_"));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let temp_root = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!("Created working scope {}", temp_root.path().display());

        Ok(Self {
            src_dir: temp_root.path().join("src"),
            build_dir: temp_root.path().join("build"),
            temp_root: Some(temp_root),
        })
    }

    /// `<base>/src/<tag>` and `<base>/build/<tag>`. Both must be absent or empty,
    /// since they are deleted again when the scope is dropped.
    pub fn in_tree(base: &Path, tag: &Tag) -> Result<Self> {
        let src_dir = base.join("src").join(tag.as_str());
        let build_dir = base.join("build").join(tag.as_str());
        for dir in [&src_dir, &build_dir] {
            if !fs::is_absent_or_empty_dir(dir)? {
                return Err(OmbError::Scope(format!(
                    "{} already exists and is not empty",
                    dir.display()
                )));
            }
        }
        if let Some(parent) = src_dir.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(
            "Using in-tree working scope {} / {}",
            src_dir.display(),
            build_dir.display()
        );

        Ok(Self {
            temp_root: None,
            src_dir,
            build_dir,
        })
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Creates the build directory. Call only once `src` is fetched and patched.
    pub fn create_build_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.build_dir)?;
        Ok(&self.build_dir)
    }
}

impl Drop for WorkingScope {
    fn drop(&mut self) {
        match self.temp_root.take() {
            Some(temp_root) => {
                let path = temp_root.path().to_path_buf();
                match temp_root.close() {
                    Ok(()) => debug!("Removed working scope {}", path.display()),
                    Err(e) => warn!("Failed to remove working scope {}: {}", path.display(), e),
                }
            }
            None => {
                for dir in [&self.src_dir, &self.build_dir] {
                    if let Err(e) = fs::remove_directory_recursive(dir) {
                        warn!("Failed to remove {}: {}", dir.display(), e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> Tag {
        s.parse().unwrap()
    }

    #[test]
    fn temporary_scope_is_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let scope = WorkingScope::temporary(Some(parent.path()), &tag("v1.3.0")).unwrap();
        std::fs::create_dir_all(scope.src_dir()).unwrap();
        std::fs::write(scope.src_dir().join("CMakeLists.txt"), "project(x)").unwrap();
        scope.create_build_dir().unwrap();
        assert!(scope.build_dir().is_dir());

        drop(scope);
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn scopes_for_the_same_tag_are_disjoint() {
        let parent = tempfile::tempdir().unwrap();
        let a = WorkingScope::temporary(Some(parent.path()), &tag("release/1.0")).unwrap();
        let b = WorkingScope::temporary(Some(parent.path()), &tag("release/1.0")).unwrap();
        assert_ne!(a.src_dir(), b.src_dir());
        assert_ne!(a.build_dir(), b.build_dir());
    }

    #[test]
    fn in_tree_scope_removes_src_and_build_but_not_prefix() {
        let base = tempfile::tempdir().unwrap();
        let prefix = base.path().join("v1.3.0");
        std::fs::create_dir_all(prefix.join("bin")).unwrap();

        let scope = WorkingScope::in_tree(base.path(), &tag("v1.3.0")).unwrap();
        assert_eq!(scope.src_dir(), base.path().join("src/v1.3.0"));
        assert_eq!(scope.build_dir(), base.path().join("build/v1.3.0"));
        std::fs::create_dir_all(scope.src_dir()).unwrap();
        scope.create_build_dir().unwrap();

        drop(scope);
        assert!(!base.path().join("src/v1.3.0").exists());
        assert!(!base.path().join("build/v1.3.0").exists());
        assert!(prefix.join("bin").is_dir());
    }

    #[test]
    fn in_tree_scope_refuses_existing_content() {
        let base = tempfile::tempdir().unwrap();
        let src = base.path().join("src/v1.3.0");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("keep.txt"), "mine").unwrap();

        let err = WorkingScope::in_tree(base.path(), &tag("v1.3.0")).unwrap_err();
        assert!(matches!(err, OmbError::Scope(_)));
        assert!(src.join("keep.txt").exists());
    }
}
