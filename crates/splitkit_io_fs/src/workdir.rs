//! Scoped transient working directory for one split run.

use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};
use tracing::debug;

use crate::spec::WorkdirError;

/// Name prefix of every working directory.
pub const C_WORKDIR_PREFIX: &str = "splitkit_";

/// Transient directory exclusively owned by one run.
///
/// The directory and everything inside it is removed when the value is
/// dropped, whichever way the run ends.
#[derive(Debug)]
pub struct SpecWorkdir {
    dir_tmp: TempDir,
}

impl SpecWorkdir {
    /// Create a fresh directory under `path_dir_parent` (system temp dir when
    /// `None`).
    pub fn create(path_dir_parent: Option<&Path>) -> Result<Self, WorkdirError> {
        let mut builder = Builder::new();
        builder.prefix(C_WORKDIR_PREFIX);
        let res_dir = match path_dir_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        let dir_tmp = res_dir.map_err(|e| WorkdirError::CreateFailed {
            parent: path_dir_parent
                .map(Path::to_path_buf)
                .unwrap_or_else(std::env::temp_dir),
            message: e.to_string(),
        })?;
        debug!(path = %dir_tmp.path().display(), "created working directory");
        Ok(Self { dir_tmp })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir_tmp.path()
    }

    /// Path of `file_name` inside the directory.
    pub fn join(&self, file_name: &str) -> PathBuf {
        self.dir_tmp.path().join(file_name)
    }
}

impl Drop for SpecWorkdir {
    fn drop(&mut self) {
        debug!(path = %self.dir_tmp.path().display(), "removing working directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workdir_is_removed_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let workdir = SpecWorkdir::create(Some(tmp.path())).unwrap();
        let path_dir = workdir.path().to_path_buf();
        std::fs::write(workdir.join("a.xlsx"), b"x").unwrap();
        assert!(path_dir.starts_with(tmp.path()));
        assert!(
            path_dir
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(C_WORKDIR_PREFIX)
        );

        drop(workdir);
        assert!(!path_dir.exists());
    }

    #[test]
    fn workdir_reports_missing_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let path_parent = tmp.path().join("missing");
        let err = SpecWorkdir::create(Some(&path_parent)).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
