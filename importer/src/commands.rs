//! Handlers for the `import`, `limits`, `setup` and `teardown` commands.
//!
//! The command-line operator stands in for the host's privileged
//! administrator, so imports run with the privilege check satisfied.

use std::io::Write;

use crate::archive::UploadedArchive;
use crate::cli::{ImportArgs, LimitsArgs};
use crate::config::ImporterConfig;
use crate::error::CommandError;
use crate::lifecycle::{on_install, on_uninstall};
use crate::output::{format_limits, import_summary, write_stderr_line};
use crate::pipeline::ModuleImporter;
use crate::response::ImportResponse;

/// Import the package named by `args`.
///
/// The JSON response is written to `stdout` and a one-line summary to
/// `stderr`. A failed import is still `Ok`; inspect
/// [`ImportResponse::success`].
///
/// # Errors
///
/// Returns an error only if the response cannot be encoded or written.
pub fn run_import(
    args: &ImportArgs,
    config: &ImporterConfig,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<ImportResponse, CommandError> {
    write_stderr_line(stderr, format!("Importing {}...", args.archive));

    let upload = UploadedArchive::from_path(args.archive.as_std_path(), args.name.as_deref()).ok();
    let importer = ModuleImporter::new(config.clone());
    let response = importer.handle_upload(upload.as_ref(), true);

    let json = response.to_json()?;
    writeln!(stdout, "{json}").map_err(|source| CommandError::WriteFailed { source })?;
    write_stderr_line(stderr, import_summary(&response));

    Ok(response)
}

/// Print the upload constraints.
///
/// # Errors
///
/// Returns an error if the output cannot be encoded or written.
pub fn run_limits(
    args: &LimitsArgs,
    config: &ImporterConfig,
    stdout: &mut dyn Write,
) -> Result<(), CommandError> {
    let limits = config.upload_limits();
    let output = if args.json {
        serde_json::to_string_pretty(&limits)?
    } else {
        format_limits(&limits)
    };
    writeln!(stdout, "{output}").map_err(|source| CommandError::WriteFailed { source })
}

/// Run the install hook.
///
/// # Errors
///
/// Returns [`CommandError::HookFailed`] if the workspace root cannot be
/// prepared.
pub fn run_setup(config: &ImporterConfig, stderr: &mut dyn Write) -> Result<(), CommandError> {
    on_install(&config.temp_root).map_err(|source| CommandError::HookFailed {
        hook: "setup",
        path: config.temp_root.clone(),
        source,
    })?;
    write_stderr_line(stderr, format!("Workspace root ready at {}", config.temp_root));
    Ok(())
}

/// Run the uninstall hook.
///
/// # Errors
///
/// Returns [`CommandError::HookFailed`] if the workspace root cannot be
/// removed.
pub fn run_teardown(config: &ImporterConfig, stderr: &mut dyn Write) -> Result<(), CommandError> {
    on_uninstall(&config.temp_root).map_err(|source| CommandError::HookFailed {
        hook: "teardown",
        path: config.temp_root.clone(),
        source,
    })?;
    write_stderr_line(stderr, format!("Removed workspace root {}", config.temp_root));
    Ok(())
}
