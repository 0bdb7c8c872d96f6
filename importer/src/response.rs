//! JSON response returned to the upload form.

use serde::Serialize;

use crate::error::ImportError;
use crate::manifest::ModuleInfo;

/// Outcome of one upload, serialised as
/// `{ "success", "message", "module_info"? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResponse {
    /// Whether the module was installed.
    pub success: bool,
    /// Human-readable outcome, safe to show to the caller.
    pub message: String,
    /// Details of the installed module; absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_info: Option<ModuleInfo>,
}

impl ImportResponse {
    /// Build the response for a successful import.
    #[must_use]
    pub fn success(info: ModuleInfo) -> Self {
        Self {
            success: true,
            message: format!("Module \"{}\" imported successfully!", info.name),
            module_info: Some(info),
        }
    }

    /// Build the response for a failed import.
    #[must_use]
    pub fn failure(err: &ImportError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            module_info: None,
        }
    }

    /// Serialise the response as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Result<ModuleInfo, ImportError>> for ImportResponse {
    fn from(result: Result<ModuleInfo, ImportError>) -> Self {
        match result {
            Ok(info) => Self::success(info),
            Err(err) => Self::failure(&err),
        }
    }
}
