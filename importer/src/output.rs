//! Human-facing output for the importer CLI.
//!
//! Machine-readable results go to stdout; everything in this module is
//! meant for stderr or for the human variants of stdout listings.

use std::fmt::Display;
use std::io::Write;

use crate::config::UploadLimits;
use crate::response::ImportResponse;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort progress output; ignore write failures.
    }
}

/// Summarise an import response in one line.
///
/// # Examples
///
/// ```
/// use module_importer::error::ImportError;
/// use module_importer::output::import_summary;
/// use module_importer::response::ImportResponse;
///
/// let response = ImportResponse::failure(&ImportError::InvalidExtension);
/// assert!(import_summary(&response).starts_with("Import failed:"));
/// ```
#[must_use]
pub fn import_summary(response: &ImportResponse) -> String {
    match (&response.module_info, response.success) {
        (Some(info), true) => format!(
            "{} (id {}, version {}, author {})",
            response.message, info.id, info.version, info.author
        ),
        _ => format!("Import failed: {}", response.message),
    }
}

/// Format upload limits for display.
#[must_use]
pub fn format_limits(limits: &UploadLimits) -> String {
    format!(
        concat!(
            "Allowed extensions: {}\n",
            "Maximum upload size: {} ({} bytes)\n",
            "Modules path: {}",
        ),
        limits.allowed_extensions.join(", "),
        limits.max_upload_size,
        limits.max_upload_bytes,
        limits.modules_path
    )
}
