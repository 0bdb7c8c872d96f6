//! Zabbix module importer library.
//!
//! This crate validates uploaded `.tar.gz` module packages, unpacks them
//! into private workspaces and publishes them into the Zabbix frontend's
//! modules directory. It is used by the `module-importer` CLI binary and can
//! be embedded by a host that receives uploads over HTTP.
//!
//! # Modules
//!
//! - [`archive`] - Upload description and extension, content and size checks
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Import, limits and lifecycle command handlers
//! - [`config`] - Importer configuration and upload limits
//! - [`error`] - User-facing error taxonomy
//! - [`extract`] - Safe `.tar.gz` extraction
//! - [`lifecycle`] - Install and uninstall hooks
//! - [`list`] - List command handler
//! - [`list_output`] - Output formatting for module listing
//! - [`manifest`] - `manifest.json` parsing and validation
//! - [`output`] - Human-facing CLI output
//! - [`pipeline`] - Import pipeline orchestration
//! - [`publish`] - Atomic publishing and permission normalisation
//! - [`response`] - JSON response returned to the uploader
//! - [`scanner`] - Discovery of installed modules
//! - [`workspace`] - Per-request extraction workspaces

pub mod archive;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod list;
pub mod list_output;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod response;
pub mod scanner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workspace;
