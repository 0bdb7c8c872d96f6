//! Per-request extraction workspaces.
//!
//! Each import unpacks into its own uniquely named directory below the
//! configured temporary root. The workspace is removed when the import
//! finishes, whatever the outcome: explicitly through
//! [`ExtractionWorkspace::cleanup`], or on drop if a stage panics.

use std::fs;
use std::io;
use std::path::Path;

use camino::Utf8Path;
use tempfile::TempDir;

use crate::error::{ImportError, Result};

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "module_";

/// A temporary directory exclusively owned by one in-flight import.
#[derive(Debug)]
pub struct ExtractionWorkspace {
    dir: Option<TempDir>,
}

impl ExtractionWorkspace {
    /// Create a fresh workspace below `temp_root`, creating the root itself
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::TempDirCreateFailed`] if either directory
    /// cannot be created.
    pub fn create(temp_root: &Utf8Path) -> Result<Self> {
        fs::create_dir_all(temp_root)
            .and_then(|()| {
                tempfile::Builder::new()
                    .prefix(WORKSPACE_PREFIX)
                    .tempdir_in(temp_root)
            })
            .map(|dir| {
                log::debug!("created workspace {}", dir.path().display());
                Self { dir: Some(dir) }
            })
            .map_err(|source| {
                log::warn!("cannot create workspace under {temp_root}: {source}");
                ImportError::TempDirCreateFailed { source }
            })
    }

    /// Return the workspace directory.
    ///
    /// After [`Self::cleanup`] this is never called, because cleanup
    /// consumes the workspace.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.as_ref().map_or(Path::new(""), TempDir::path)
    }

    /// Remove the workspace and everything in it.
    ///
    /// Never fails: a workspace that has already disappeared (for example
    /// because its whole directory was published) is fine, and any other
    /// removal error is logged.
    pub fn cleanup(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => log::debug!("removed workspace {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("failed to remove workspace {}: {e}", path.display()),
        }
    }
}

impl Drop for ExtractionWorkspace {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Recursively remove `path`, treating an absent path as success.
///
/// # Errors
///
/// Returns any I/O error other than `NotFound`.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
