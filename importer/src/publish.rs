//! Publishing validated module trees into the modules root.
//!
//! The final `rename` is the collision arbiter: two imports of the same
//! identifier may both pass [`Publisher::check_collision`], but only one
//! rename can land on the target name. The loser sees the destination
//! already present and reports [`PublishError::AlreadyExists`]. When the
//! workspace lives on another filesystem the tree is copied into a hidden
//! sibling of the target first, so a half-copied module is never visible
//! under its final name.

use std::fs;
use std::io;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::manifest::ModuleId;
use crate::workspace::remove_tree;

/// Mode applied to every directory of an installed module.
pub const DIRECTORY_MODE: u32 = 0o755;

/// Mode applied to every file of an installed module.
pub const FILE_MODE: u32 = 0o644;

/// Errors raised while moving a module into place.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Something already occupies the target directory name.
    #[error("module directory `{id}` already exists")]
    AlreadyExists {
        /// Sanitised directory name of the conflicting module.
        id: String,
    },

    /// The identifier sanitises to an empty directory name.
    #[error("module identifier `{id}` yields no usable directory name")]
    InvalidName {
        /// The identifier as declared in the manifest.
        id: String,
    },

    /// Renaming or copying the tree failed.
    #[error("failed to publish module: {source}")]
    Io {
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

impl From<io::Error> for PublishError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

/// Reduce a module identifier to a directory-safe name.
///
/// Only ASCII letters, digits, `-` and `_` survive, so separators and dot
/// sequences such as `../` can never reach the filesystem.
///
/// # Examples
///
/// ```
/// use module_importer::publish::sanitize_directory_name;
///
/// assert_eq!(sanitize_directory_name("demo_module-2"), "demo_module-2");
/// assert_eq!(sanitize_directory_name("../evil"), "evil");
/// ```
#[must_use]
pub fn sanitize_directory_name(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

/// Moves module trees into a fixed modules root.
#[derive(Debug, Clone)]
pub struct Publisher {
    modules_root: Utf8PathBuf,
}

impl Publisher {
    /// Create a publisher targeting `modules_root`.
    #[must_use]
    pub fn new(modules_root: Utf8PathBuf) -> Self {
        Self { modules_root }
    }

    /// Return the modules root.
    #[must_use]
    pub fn modules_root(&self) -> &Utf8Path {
        &self.modules_root
    }

    /// Compute where the module with `id` is installed.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidName`] if nothing of `id` survives
    /// sanitisation.
    pub fn install_path(&self, id: &ModuleId) -> Result<Utf8PathBuf, PublishError> {
        let name = sanitize_directory_name(id.as_str());
        if name.is_empty() {
            return Err(PublishError::InvalidName {
                id: id.as_str().to_owned(),
            });
        }
        Ok(self.modules_root.join(name))
    }

    /// Fail fast if a module with `id` is already installed.
    ///
    /// This is only an early exit; [`Self::publish`] decides races.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::AlreadyExists`] when the install path is
    /// occupied by anything, including a dangling symlink.
    pub fn check_collision(&self, id: &ModuleId) -> Result<(), PublishError> {
        let target = self.install_path(id)?;
        match fs::symlink_metadata(&target) {
            Ok(_) => Err(already_exists(&target)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Move `module_root` into the modules root under the sanitised `id`.
    ///
    /// Returns the installed path.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::AlreadyExists`] if the target name is taken
    /// when the rename happens, and [`PublishError::Io`] for any other
    /// failure.
    pub fn publish(&self, module_root: &Path, id: &ModuleId) -> Result<Utf8PathBuf, PublishError> {
        let target = self.install_path(id)?;
        fs::create_dir_all(&self.modules_root)?;

        match fs::rename(module_root, &target) {
            Ok(()) => {
                log::debug!("renamed {} to {target}", module_root.display());
                Ok(target)
            }
            Err(e) if is_collision(&e) => Err(already_exists(&target)),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                log::debug!("workspace is on another filesystem; copying into {target}");
                self.publish_by_copy(module_root, &target)?;
                Ok(target)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Copy `module_root` into a hidden sibling of `target`, then rename the
    /// copy into place and remove the source.
    pub(crate) fn publish_by_copy(
        &self,
        module_root: &Path,
        target: &Utf8Path,
    ) -> Result<(), PublishError> {
        let name = target.file_name().unwrap_or("module");
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{name}.partial-"))
            .tempdir_in(&self.modules_root)?;

        copy_tree(module_root, staging.path())?;

        match fs::rename(staging.path(), target) {
            Ok(()) => {}
            Err(e) if is_collision(&e) => return Err(already_exists(target)),
            Err(e) => return Err(e.into()),
        }

        // The staging directory now lives under `target`.
        if let Err(e) = staging.close() {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("failed to discard staging directory: {e}");
            }
        }
        if let Err(e) = remove_tree(module_root) {
            log::warn!("failed to remove {}: {e}", module_root.display());
        }
        Ok(())
    }
}

fn is_collision(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::AlreadyExists
            | io::ErrorKind::DirectoryNotEmpty
            | io::ErrorKind::NotADirectory
    )
}

fn already_exists(target: &Utf8Path) -> PublishError {
    PublishError::AlreadyExists {
        id: target.file_name().unwrap_or_default().to_owned(),
    }
}

/// Recursively copy regular files and directories from `src` into the
/// existing directory `dest`.
fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = fs::symlink_metadata(&from)?.file_type();

        if file_type.is_dir() {
            fs::create_dir(&to)?;
            copy_tree(&from, &to)?;
        } else if file_type.is_file() {
            fs::copy(&from, &to)?;
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to copy special file {}", from.display()),
            ));
        }
    }
    Ok(())
}

/// Apply [`DIRECTORY_MODE`] and [`FILE_MODE`] to `root` and everything
/// below it. Symlinks are left alone and never followed.
///
/// # Errors
///
/// Returns the first I/O error encountered.
#[cfg(unix)]
pub fn normalize_permissions(root: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let file_type = fs::symlink_metadata(root)?.file_type();
    if file_type.is_dir() {
        fs::set_permissions(root, fs::Permissions::from_mode(DIRECTORY_MODE))?;
        for entry in fs::read_dir(root)? {
            normalize_permissions(&entry?.path())?;
        }
    } else if file_type.is_file() {
        fs::set_permissions(root, fs::Permissions::from_mode(FILE_MODE))?;
    }
    Ok(())
}

/// Permission bits are a Unix concept; elsewhere this is a no-op.
///
/// # Errors
///
/// Never fails on non-Unix targets.
#[cfg(not(unix))]
pub fn normalize_permissions(_root: &Path) -> io::Result<()> {
    Ok(())
}
