//! Error types for the module importer.
//!
//! [`ImportError`] is the user-facing taxonomy: every pipeline stage fails
//! with exactly one of its variants. The `Display` text of each variant is
//! safe to return to a browser; it never contains filesystem paths or OS
//! error strings. The underlying cause, where one exists, is kept as the
//! error source so that it can be logged.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::extract::ExtractionError;
use crate::manifest::ManifestError;
use crate::publish::PublishError;

/// Errors that can occur while importing a module package.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The caller is not a privileged administrator.
    #[error("You do not have permission to import modules.")]
    PermissionDenied,

    /// No file was received, or the upload slot is unusable.
    #[error("Failed to upload file. Please try again.")]
    NoFileUploaded,

    /// The declared filename does not end in `.tar.gz` or `.tgz`.
    #[error("Invalid file extension. Only .tar.gz and .tgz files are allowed.")]
    InvalidExtension,

    /// The file content is not a gzip stream.
    #[error("Invalid file type. Only tar.gz archives are allowed.")]
    InvalidContentType,

    /// The declared size exceeds the upload ceiling.
    #[error("File size exceeds maximum allowed size of {limit}.")]
    FileTooLarge {
        /// Human-readable ceiling, e.g. `50 MB`.
        limit: String,
    },

    /// The per-request workspace could not be created.
    #[error("Failed to create temporary directory.")]
    TempDirCreateFailed {
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be decompressed or unpacked.
    #[error("Failed to extract archive.")]
    ExtractionFailed {
        /// The underlying extraction failure.
        #[source]
        source: ExtractionError,
    },

    /// An archive entry would resolve outside the workspace.
    #[error("Archive contains an unsafe path.")]
    PathTraversal,

    /// `manifest.json` is absent from the module root.
    #[error("Invalid module structure: manifest.json not found.")]
    ManifestNotFound,

    /// `manifest.json` is not a JSON object.
    #[error("Invalid manifest.json: unable to parse JSON.")]
    ManifestParseError {
        /// The underlying parse or read failure.
        #[source]
        source: ManifestError,
    },

    /// A required manifest field is absent or empty.
    #[error("Invalid manifest.json: missing required field \"{field}\".")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The manifest `id` contains characters outside `[A-Za-z0-9_-]`.
    #[error(
        "Invalid module ID: only alphanumeric characters, hyphens and underscores are allowed."
    )]
    InvalidModuleId,

    /// The manifest `namespace` is not an upper-case-led alphanumeric word.
    #[error(
        "Invalid namespace: must start with uppercase letter and contain only alphanumeric characters."
    )]
    InvalidNamespace,

    /// A module with the same identifier is already installed.
    #[error("Module with ID \"{id}\" already exists. Please remove it before importing.")]
    ModuleAlreadyExists {
        /// The conflicting module identifier.
        id: String,
    },

    /// The module tree could not be moved into the modules root.
    #[error("Failed to move module to final destination.")]
    PublishFailed {
        /// The underlying publish failure.
        #[source]
        source: PublishError,
    },

    /// Anything not covered above, including post-publish failures.
    #[error("An unexpected error occurred while importing the module.")]
    UnexpectedError {
        /// Internal description, logged but never shown to the caller.
        detail: String,
    },
}

impl ImportError {
    /// Return the stable machine-readable name of this failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use module_importer::error::ImportError;
    ///
    /// assert_eq!(ImportError::PathTraversal.code(), "PathTraversal");
    /// ```
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PermissionDenied",
            Self::NoFileUploaded => "NoFileUploaded",
            Self::InvalidExtension => "InvalidExtension",
            Self::InvalidContentType => "InvalidContentType",
            Self::FileTooLarge { .. } => "FileTooLarge",
            Self::TempDirCreateFailed { .. } => "TempDirCreateFailed",
            Self::ExtractionFailed { .. } => "ExtractionFailed",
            Self::PathTraversal => "PathTraversal",
            Self::ManifestNotFound => "ManifestNotFound",
            Self::ManifestParseError { .. } => "ManifestParseError",
            Self::MissingField { .. } => "MissingField",
            Self::InvalidModuleId => "InvalidModuleId",
            Self::InvalidNamespace => "InvalidNamespace",
            Self::ModuleAlreadyExists { .. } => "ModuleAlreadyExists",
            Self::PublishFailed { .. } => "PublishFailed",
            Self::UnexpectedError { .. } => "UnexpectedError",
        }
    }

    /// Build an [`ImportError::UnexpectedError`] from any displayable fault.
    #[must_use]
    pub fn unexpected(detail: impl std::fmt::Display) -> Self {
        Self::UnexpectedError {
            detail: detail.to_string(),
        }
    }
}

impl From<ExtractionError> for ImportError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::PathTraversal { .. } => Self::PathTraversal,
            other => Self::ExtractionFailed { source: other },
        }
    }
}

impl From<PublishError> for ImportError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::AlreadyExists { id } => Self::ModuleAlreadyExists { id },
            other => Self::PublishFailed { source: other },
        }
    }
}

/// Result type alias using [`ImportError`].
pub type Result<T> = std::result::Result<T, ImportError>;

/// Errors raised by the command-line front end outside the import pipeline.
///
/// Import failures are not errors at this level: they are reported through
/// the JSON response.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The modules root could not be scanned.
    #[error("failed to scan modules root {path}: {source}")]
    ScanFailed {
        /// The modules root.
        path: Utf8PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A lifecycle hook failed.
    #[error("{hook} hook failed for {path}: {source}")]
    HookFailed {
        /// Name of the hook, `setup` or `teardown`.
        hook: &'static str,
        /// The workspace root the hook operated on.
        path: Utf8PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The response could not be encoded.
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    /// Output could not be written to stdout.
    #[error("failed to write output: {source}")]
    WriteFailed {
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::traversal(
        ExtractionError::PathTraversal { path: "../../etc/passwd".to_owned() },
        "PathTraversal"
    )]
    #[case::io(
        ExtractionError::Io(std::io::Error::other("disk full")),
        "ExtractionFailed"
    )]
    #[case::entry_limit(
        ExtractionError::EntryLimitExceeded { limit: 10_000 },
        "ExtractionFailed"
    )]
    fn extraction_errors_map_to_taxonomy(#[case] err: ExtractionError, #[case] code: &str) {
        assert_eq!(ImportError::from(err).code(), code);
    }

    #[test]
    fn publish_collision_maps_to_module_already_exists() {
        let err = ImportError::from(PublishError::AlreadyExists {
            id: "demo".to_owned(),
        });
        assert!(matches!(err, ImportError::ModuleAlreadyExists { ref id } if id == "demo"));
        assert!(err.to_string().contains("\"demo\" already exists"));
    }

    #[test]
    fn messages_do_not_leak_paths() {
        let err = ImportError::from(ExtractionError::PathTraversal {
            path: "/srv/secret/../../etc/passwd".to_owned(),
        });
        assert!(!err.to_string().contains("/srv/secret"));

        let err = ImportError::from(ExtractionError::Io(std::io::Error::other(
            "/tmp/zabbix_module_import/module_x: no space left",
        )));
        assert!(!err.to_string().contains("/tmp"));
    }

    #[test]
    fn file_too_large_reports_limit() {
        let err = ImportError::FileTooLarge {
            limit: "50 MB".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "File size exceeds maximum allowed size of 50 MB."
        );
    }
}
