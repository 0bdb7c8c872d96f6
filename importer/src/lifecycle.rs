//! Install and uninstall hooks for the importer itself.
//!
//! These prepare and remove the parent directory of all extraction
//! workspaces. They are not part of the import pipeline.

use std::fs;
use std::io;

use camino::Utf8Path;

use crate::workspace::remove_tree;

/// Mode of the workspace root created by [`on_install`].
pub const TEMP_ROOT_MODE: u32 = 0o755;

/// Ensure the workspace root exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or its mode set.
pub fn on_install(temp_root: &Utf8Path) -> io::Result<()> {
    fs::create_dir_all(temp_root)?;
    set_root_mode(temp_root)?;
    log::info!("prepared workspace root {temp_root}");
    Ok(())
}

/// Remove the workspace root and anything left inside it.
///
/// A root that does not exist is not an error.
///
/// # Errors
///
/// Returns an error if an existing root cannot be removed.
pub fn on_uninstall(temp_root: &Utf8Path) -> io::Result<()> {
    remove_tree(temp_root.as_std_path())?;
    log::info!("removed workspace root {temp_root}");
    Ok(())
}

#[cfg(unix)]
fn set_root_mode(path: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(TEMP_ROOT_MODE))
}

#[cfg(not(unix))]
fn set_root_mode(_path: &Utf8Path) -> io::Result<()> {
    Ok(())
}
