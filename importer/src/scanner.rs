//! Scanner for modules already installed under the modules root.
//!
//! Listing is lenient: a module whose manifest cannot be read or decoded is
//! still reported, with its directory name standing in for the missing
//! identity fields. Directories without a `manifest.json` are not modules
//! and are skipped, as are hidden directories such as the staging copies
//! left by an interrupted cross-device publish.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};
use serde_json::{Map, Value};

use crate::manifest::{MANIFEST_FILE, ModuleInfo, UNKNOWN_AUTHOR};

/// Version reported for modules whose manifest does not declare one.
pub const UNKNOWN_VERSION: &str = "N/A";

/// A module directory found under the modules root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModule {
    /// Name of the module directory.
    pub directory: String,
    /// Full path to the module directory.
    pub path: Utf8PathBuf,
    /// Identity as declared by the manifest, with fallbacks applied.
    pub info: ModuleInfo,
}

/// Installed modules sorted by directory name.
#[derive(Debug, Clone, Default)]
pub struct InstalledModules {
    /// The modules found.
    pub modules: Vec<InstalledModule>,
}

impl InstalledModules {
    /// Returns true if no modules are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Scan `modules_root` for installed modules.
///
/// A missing modules root lists as empty.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn scan_installed(modules_root: &Utf8Path) -> io::Result<InstalledModules> {
    let mut result = InstalledModules::default();

    if !modules_root.is_dir() {
        debug!("modules root {modules_root} does not exist");
        return Ok(result);
    }

    for entry in modules_root.read_dir_utf8()? {
        let entry = entry?;
        let directory = entry.file_name();

        if directory.starts_with('.') || !entry.path().is_dir() {
            continue;
        }

        let manifest_path = entry.path().join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            trace!("skipping {directory}: no {MANIFEST_FILE}");
            continue;
        }

        result.modules.push(InstalledModule {
            directory: directory.to_owned(),
            path: entry.path().to_owned(),
            info: read_listing_info(&manifest_path, directory),
        });
    }

    result
        .modules
        .sort_by(|a, b| a.directory.cmp(&b.directory));

    Ok(result)
}

/// Read the listing fields from a manifest, falling back to `directory`
/// for the id and name and to `N/A` for the version and author.
fn read_listing_info(manifest_path: &Utf8Path, directory: &str) -> ModuleInfo {
    let fields = fs::read_to_string(manifest_path)
        .map_err(|e| debug!("cannot read {manifest_path}: {e}"))
        .ok()
        .and_then(|text| {
            serde_json::from_str::<Value>(&text)
                .map_err(|e| debug!("cannot decode {manifest_path}: {e}"))
                .ok()
        })
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();

    ModuleInfo {
        id: text_or(&fields, "id", directory),
        name: text_or(&fields, "name", directory),
        version: text_or(&fields, "version", UNKNOWN_VERSION),
        author: text_or(&fields, "author", UNKNOWN_AUTHOR),
    }
}

fn text_or(fields: &Map<String, Value>, key: &str, fallback: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback.to_owned(),
    }
}
