//! Module manifest loading and validation.
//!
//! A module package carries a `manifest.json` at its root. The importer
//! needs five identity fields from it and treats everything else as opaque:
//! the frontend that later loads the module validates the rest. Field values
//! are accepted as JSON strings or numbers (stock manifests often write
//! `"manifest_version": 2.0`); empty strings, `null`, booleans and
//! containers count as absent.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ImportError, Result};

/// File name of the manifest inside a module root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Fields every manifest must carry, in validation order.
pub const REQUIRED_FIELDS: [&str; 5] = ["manifest_version", "id", "name", "version", "namespace"];

/// Author reported when the manifest does not name one.
pub const UNKNOWN_AUTHOR: &str = "N/A";

static MODULE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("module id pattern is valid"));

static NAMESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("namespace pattern is valid"));

/// Errors raised while reading or decoding `manifest.json`.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest file exists but could not be read.
    #[error("failed to read manifest: {0}")]
    Read(#[from] io::Error),

    /// The manifest is not valid JSON.
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The manifest is valid JSON but not an object.
    #[error("manifest must be a JSON object")]
    NotAnObject,
}

/// A validated module identifier.
///
/// Only ASCII letters, digits, `-` and `_` are allowed, which makes the
/// identifier safe to use as a single path component.
///
/// # Examples
///
/// ```
/// use module_importer::manifest::ModuleId;
///
/// assert!(ModuleId::try_from("host-inventory_v2").is_ok());
/// assert!(ModuleId::try_from("../evil").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModuleId {
    type Error = ImportError;

    fn try_from(value: String) -> Result<Self> {
        if MODULE_ID_PATTERN.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(ImportError::InvalidModuleId)
        }
    }
}

impl TryFrom<&str> for ModuleId {
    type Error = ImportError;

    fn try_from(value: &str) -> Result<Self> {
        Self::try_from(value.to_owned())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated PHP namespace segment: an upper-case letter followed by
/// letters and digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Return the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Namespace {
    type Error = ImportError;

    fn try_from(value: String) -> Result<Self> {
        if NAMESPACE_PATTERN.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(ImportError::InvalidNamespace)
        }
    }
}

impl TryFrom<&str> for Namespace {
    type Error = ImportError;

    fn try_from(value: &str) -> Result<Self> {
        Self::try_from(value.to_owned())
    }
}

/// The identity fields of a module package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    /// Manifest schema version, as written by the package author.
    pub manifest_version: String,
    /// Module identifier; also the installed directory name.
    pub id: ModuleId,
    /// Display name.
    pub name: String,
    /// Module version string.
    pub version: String,
    /// PHP namespace segment of the module.
    pub namespace: Namespace,
    /// Optional author.
    pub author: Option<String>,
}

impl ModuleManifest {
    /// Summarise the manifest for the caller.
    #[must_use]
    pub fn module_info(&self) -> ModuleInfo {
        ModuleInfo {
            id: self.id.as_str().to_owned(),
            name: self.name.clone(),
            version: self.version.clone(),
            author: self
                .author
                .clone()
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_owned()),
        }
    }
}

/// Module details reported back after a successful import or in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Module identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Module version string.
    pub version: String,
    /// Author, or `N/A`.
    pub author: String,
}

/// Read and validate `manifest.json` from `module_root`.
///
/// # Errors
///
/// Returns [`ImportError::ManifestNotFound`] if the file is missing or is
/// not a regular file, [`ImportError::ManifestParseError`] if it cannot be
/// read or decoded, and the field errors of [`parse_manifest`].
pub fn load_manifest(module_root: &Path) -> Result<ModuleManifest> {
    let path = module_root.join(MANIFEST_FILE);
    match fs::symlink_metadata(&path) {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return Err(ImportError::ManifestNotFound),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ImportError::ManifestNotFound);
        }
        Err(e) => {
            return Err(ImportError::ManifestParseError {
                source: ManifestError::Read(e),
            });
        }
    }

    let contents = fs::read_to_string(&path).map_err(|e| ImportError::ManifestParseError {
        source: ManifestError::Read(e),
    })?;
    parse_manifest(&contents)
}

/// Decode and validate manifest JSON.
///
/// # Errors
///
/// Returns [`ImportError::ManifestParseError`] for malformed JSON or a
/// non-object document, [`ImportError::MissingField`] for the first absent
/// required field, and [`ImportError::InvalidModuleId`] or
/// [`ImportError::InvalidNamespace`] for malformed identifiers.
///
/// # Examples
///
/// ```
/// use module_importer::manifest::parse_manifest;
///
/// let json = r#"{"manifest_version":2.0,"id":"demo","name":"Demo","version":"1.0","namespace":"Demo"}"#;
/// let manifest = parse_manifest(json).expect("valid manifest");
/// assert_eq!(manifest.id.as_str(), "demo");
/// assert_eq!(manifest.module_info().author, "N/A");
/// ```
pub fn parse_manifest(json: &str) -> Result<ModuleManifest> {
    let value: Value = serde_json::from_str(json).map_err(|e| ImportError::ManifestParseError {
        source: ManifestError::Json(e),
    })?;
    let Value::Object(fields) = value else {
        return Err(ImportError::ManifestParseError {
            source: ManifestError::NotAnObject,
        });
    };

    for field in REQUIRED_FIELDS {
        if field_text(&fields, field).is_none() {
            return Err(ImportError::MissingField { field });
        }
    }

    let required = |field: &'static str| {
        field_text(&fields, field).ok_or(ImportError::MissingField { field })
    };

    Ok(ModuleManifest {
        manifest_version: required("manifest_version")?,
        id: ModuleId::try_from(required("id")?)?,
        name: required("name")?,
        version: required("version")?,
        namespace: Namespace::try_from(required("namespace")?)?,
        author: field_text(&fields, "author"),
    })
}

/// Return a field as text when it holds a non-empty string or a number.
fn field_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
