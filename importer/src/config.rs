//! Importer configuration.
//!
//! The modules root and the temporary root are plain values injected into the
//! pipeline at construction time, so tests can point them at isolated
//! directories. Values are deserialised from an optional TOML file and fall
//! back to the defaults used by a stock Zabbix frontend installation.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::{ALLOWED_EXTENSIONS, format_bytes};

/// Maximum accepted upload size in bytes (50 MiB).
pub const MAX_UPLOAD_SIZE: u64 = 52_428_800;

/// Default ceiling for the total size of extracted regular files (512 MiB).
pub const MAX_EXTRACTED_SIZE: u64 = 536_870_912;

/// Default ceiling for the number of files and directories in one package.
pub const MAX_ENTRIES: u64 = 10_000;

/// Default directory holding installed modules.
pub const DEFAULT_MODULES_ROOT: &str = "/usr/share/zabbix/modules";

/// Default parent directory for per-request workspaces.
pub const DEFAULT_TEMP_ROOT: &str = "/tmp/zabbix_module_import";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`ImporterConfig`].
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for the import pipeline.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ImporterConfig {
    /// Directory where installed modules live, one subdirectory per module.
    pub modules_root: Utf8PathBuf,
    /// Directory under which per-request workspaces are created.
    pub temp_root: Utf8PathBuf,
    /// Largest declared upload size accepted, in bytes.
    pub max_upload_size: u64,
    /// Largest total size of files written during extraction, in bytes.
    pub max_extracted_size: u64,
    /// Largest number of files and directories one package may create.
    pub max_entries: u64,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            modules_root: Utf8PathBuf::from(DEFAULT_MODULES_ROOT),
            temp_root: Utf8PathBuf::from(DEFAULT_TEMP_ROOT),
            max_upload_size: MAX_UPLOAD_SIZE,
            max_extracted_size: MAX_EXTRACTED_SIZE,
            max_entries: MAX_ENTRIES,
        }
    }
}

impl ImporterConfig {
    /// Build a configuration rooted at the given directories with default
    /// size limits.
    ///
    /// # Examples
    ///
    /// ```
    /// use module_importer::config::{ImporterConfig, MAX_UPLOAD_SIZE};
    ///
    /// let config = ImporterConfig::with_roots("/srv/modules", "/srv/tmp");
    /// assert_eq!(config.modules_root.as_str(), "/srv/modules");
    /// assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
    /// ```
    #[must_use]
    pub fn with_roots(
        modules_root: impl Into<Utf8PathBuf>,
        temp_root: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            modules_root: modules_root.into(),
            temp_root: temp_root.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load configuration from `path`, or return the defaults when no path
    /// is given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if its contents are invalid.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Describe the upload constraints shown to an administrator before
    /// they pick a file.
    #[must_use]
    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            allowed_extensions: ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_owned())
                .collect(),
            max_upload_size: format_bytes(self.max_upload_size),
            max_upload_bytes: self.max_upload_size,
            modules_path: self.modules_root.clone(),
        }
    }

    /// Apply command-line overrides on top of the loaded values.
    #[must_use]
    pub fn with_overrides(
        mut self,
        modules_root: Option<Utf8PathBuf>,
        temp_root: Option<Utf8PathBuf>,
    ) -> Self {
        if let Some(root) = modules_root {
            self.modules_root = root;
        }
        if let Some(root) = temp_root {
            self.temp_root = root;
        }
        self
    }
}

/// Upload constraints as presented to the uploader.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct UploadLimits {
    /// Accepted filename suffixes, without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Size ceiling formatted for display, e.g. `50 MB`.
    pub max_upload_size: String,
    /// Size ceiling in bytes.
    pub max_upload_bytes: u64,
    /// Directory modules are installed into.
    pub modules_path: Utf8PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_match_stock_frontend_layout() {
        let config = ImporterConfig::default();

        assert_eq!(config.modules_root.as_str(), "/usr/share/zabbix/modules");
        assert_eq!(config.temp_root.as_str(), "/tmp/zabbix_module_import");
        assert_eq!(config.max_upload_size, 52_428_800);
        assert_eq!(config.max_entries, MAX_ENTRIES);
    }

    #[rstest]
    fn entry_ceiling_is_configurable() {
        let config = ImporterConfig::from_toml_str("max_entries = 250\n").expect("parses");
        assert_eq!(config.max_entries, 250);
    }

    #[rstest]
    fn deserialises_partial_overrides() {
        let source = "modules_root = \"/opt/modules\"\nmax_upload_size = 1024\n";

        let config =
            ImporterConfig::from_toml_str(source).expect("expected configuration to parse");

        assert_eq!(config.modules_root.as_str(), "/opt/modules");
        assert_eq!(config.temp_root.as_str(), DEFAULT_TEMP_ROOT);
        assert_eq!(config.max_upload_size, 1024);
    }

    #[rstest]
    fn rejects_unknown_keys() {
        let result = ImporterConfig::from_toml_str("modules_path = \"/opt\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[rstest]
    fn load_without_path_returns_defaults() {
        let config = ImporterConfig::load(None).expect("defaults");
        assert_eq!(config, ImporterConfig::default());
    }

    #[rstest]
    fn load_reads_file_from_disk() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().join("importer.toml")).expect("utf8 path");
        std::fs::write(&path, "temp_root = \"/var/tmp/imports\"\n").expect("write config");

        let config = ImporterConfig::load(Some(&path)).expect("config loads");

        assert_eq!(config.temp_root.as_str(), "/var/tmp/imports");
    }

    #[rstest]
    fn load_reports_missing_file() {
        let path = Utf8PathBuf::from("/nonexistent/importer.toml");
        let result = ImporterConfig::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[rstest]
    fn overrides_replace_only_given_fields() {
        let config = ImporterConfig::default()
            .with_overrides(Some(Utf8PathBuf::from("/srv/modules")), None);

        assert_eq!(config.modules_root.as_str(), "/srv/modules");
        assert_eq!(config.temp_root.as_str(), DEFAULT_TEMP_ROOT);
    }

    #[rstest]
    fn upload_limits_describe_defaults() {
        let limits = ImporterConfig::default().upload_limits();

        assert_eq!(limits.allowed_extensions, ["tar.gz", "tgz"]);
        assert_eq!(limits.max_upload_size, "50 MB");
        assert_eq!(limits.max_upload_bytes, MAX_UPLOAD_SIZE);
        assert_eq!(limits.modules_path.as_str(), DEFAULT_MODULES_ROOT);
    }
}
