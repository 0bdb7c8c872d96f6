//! List command implementation.
//!
//! This module provides the `run_list` command handler for querying and
//! displaying installed modules.

use std::io::Write;

use crate::cli::ListArgs;
use crate::config::ImporterConfig;
use crate::error::CommandError;
use crate::list_output::{format_human, format_json};
use crate::scanner::scan_installed;

/// Lists modules installed under the configured modules root.
///
/// Output is written to stdout (human-readable by default, JSON with `--json`).
///
/// # Errors
///
/// Returns an error if:
/// - The modules root exists but cannot be scanned
/// - Writing to stdout fails
pub fn run_list(
    args: &ListArgs,
    config: &ImporterConfig,
    stdout: &mut dyn Write,
) -> Result<(), CommandError> {
    let installed =
        scan_installed(&config.modules_root).map_err(|source| CommandError::ScanFailed {
            path: config.modules_root.clone(),
            source,
        })?;

    let output = if args.json {
        format_json(&installed)
    } else {
        format_human(&installed)
    };

    writeln!(stdout, "{output}").map_err(|source| CommandError::WriteFailed { source })?;

    Ok(())
}
