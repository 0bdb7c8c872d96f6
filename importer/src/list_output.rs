//! Output formatting for module listing.
//!
//! This module formats installed module information for human-readable or
//! JSON output.

use serde::Serialize;

use crate::manifest::ModuleInfo;
use crate::scanner::InstalledModules;

/// Format installed modules for human-readable output.
///
/// # Examples
///
/// ```
/// use module_importer::list_output::format_human;
/// use module_importer::scanner::InstalledModules;
///
/// let output = format_human(&InstalledModules::default());
/// assert!(output.contains("No modules installed"));
/// ```
#[must_use]
pub fn format_human(installed: &InstalledModules) -> String {
    if installed.is_empty() {
        return String::from(
            "No modules installed.\n\nRun `module-importer import <ARCHIVE>` to install one.",
        );
    }

    let mut output = String::from("Installed modules:\n\n");
    for module in &installed.modules {
        let info = &module.info;
        output.push_str(&format!(
            "  {} ({})\n    version: {}\n    author:  {}\n    path:    {}\n",
            info.name, info.id, info.version, info.author, module.path
        ));
    }
    output
}

/// Format installed modules as JSON.
///
/// # Examples
///
/// ```
/// use module_importer::list_output::format_json;
/// use module_importer::scanner::InstalledModules;
///
/// let json = format_json(&InstalledModules::default());
/// assert!(json.contains("\"modules\""));
/// ```
#[must_use]
pub fn format_json(installed: &InstalledModules) -> String {
    let json_data = InstalledModulesJson {
        modules: installed.modules.iter().map(|m| &m.info).collect(),
    };

    serde_json::to_string_pretty(&json_data).unwrap_or_else(|_| "{}".to_owned())
}

/// JSON-serializable representation of installed modules.
#[derive(Debug, Serialize)]
pub struct InstalledModulesJson<'a> {
    /// Installed modules in directory order.
    pub modules: Vec<&'a ModuleInfo>,
}
