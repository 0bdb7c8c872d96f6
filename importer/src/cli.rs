//! CLI argument definitions for the module importer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::config::{ConfigError, ImporterConfig};

/// Import Zabbix frontend modules from `.tar.gz` packages.
#[derive(Parser, Debug)]
#[command(name = "module-importer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Import Zabbix frontend modules from .tar.gz packages.\n\n",
    "A package is validated by extension, content and size, unpacked into a ",
    "private workspace, checked for a well-formed manifest.json, and then ",
    "moved into the modules directory under its manifest id. A module that ",
    "is already installed is never overwritten.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Import a package:\n",
    "    $ module-importer import ./demo-1.0.tar.gz\n\n",
    "  Import into a custom modules directory:\n",
    "    $ module-importer --modules-root /srv/zabbix/modules import demo.tgz\n\n",
    "  List installed modules as JSON:\n",
    "    $ module-importer list --json\n\n",
    "  Prepare the workspace root after installing the importer:\n",
    "    $ module-importer setup",
))]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding installed modules [default: /usr/share/zabbix/modules].
    #[arg(long, value_name = "DIR", global = true)]
    pub modules_root: Option<Utf8PathBuf>,

    /// Parent directory for extraction workspaces [default: /tmp/zabbix_module_import].
    #[arg(long, value_name = "DIR", global = true)]
    pub temp_root: Option<Utf8PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Import a module package and print the JSON response.
    Import(ImportArgs),

    /// List installed modules.
    List(ListArgs),

    /// Show the upload constraints.
    Limits(LimitsArgs),

    /// Create the workspace root (install hook).
    Setup,

    /// Remove the workspace root and its contents (uninstall hook).
    Teardown,
}

/// Arguments for the import command.
#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// Path to the uploaded package.
    #[arg(value_name = "ARCHIVE")]
    pub archive: Utf8PathBuf,

    /// Declared filename of the upload [default: the archive's file name].
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,
}

/// Arguments for the list command.
#[derive(Parser, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the limits command.
#[derive(Parser, Debug, Clone, Default)]
pub struct LimitsArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Load the configuration file, if any, and apply directory overrides.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration file cannot be read
    /// or parsed.
    pub fn importer_config(&self) -> Result<ImporterConfig, ConfigError> {
        Ok(ImporterConfig::load(self.config.as_deref())?
            .with_overrides(self.modules_root.clone(), self.temp_root.clone()))
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
