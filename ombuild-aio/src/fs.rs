/*
File: ombuild-aio/src/fs.rs
Purpose: Primitive synchronous filesystem operations.
*/
use std::fs;
use std::io;
use std::path::Path;

use ombuild_common::error::{OmbError, Result};
use tracing::{debug, error};

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        OmbError::from(e)
    })
}

/// Removes a directory and all its contents recursively. A missing directory is not an error.
pub fn remove_directory_recursive(path: &Path) -> Result<()> {
    debug!("Removing directory recursively: {}", path.display());
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed remove dir {}: {}", path.display(), e);
            Err(OmbError::from(e))
        }
    }
}

/// True if `path` does not exist or is an empty directory.
pub fn is_absent_or_empty_dir(path: &Path) -> Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(OmbError::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_empty_directories_are_usable_destinations() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_absent_or_empty_dir(&dir.path().join("missing")).unwrap());
        assert!(is_absent_or_empty_dir(dir.path()).unwrap());

        fs::write(dir.path().join("file"), "x").unwrap();
        assert!(!is_absent_or_empty_dir(dir.path()).unwrap());
    }

    #[test]
    fn a_regular_file_is_not_a_usable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(is_absent_or_empty_dir(&file).is_err());
    }

    #[test]
    fn removing_a_missing_directory_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        create_dir_all(&nested).unwrap();
        remove_directory_recursive(&dir.path().join("a")).unwrap();
        assert!(!dir.path().join("a").exists());
        remove_directory_recursive(&dir.path().join("a")).unwrap();
    }
}
