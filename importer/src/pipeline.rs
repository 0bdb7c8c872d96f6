//! Import pipeline orchestration.
//!
//! Stages run in a fixed order and the first failure ends the run:
//! archive validation, extraction into a fresh workspace, manifest
//! validation, the early collision check, publishing, and permission
//! normalisation. The workspace is removed before [`ModuleImporter::import`]
//! returns on every path; the published module directory never is.

use std::panic::{self, AssertUnwindSafe};

use crate::archive::{UploadedArchive, validate_archive};
use crate::config::ImporterConfig;
use crate::error::{ImportError, Result};
use crate::extract::{ArchiveExtractor, GzipExtractor};
use crate::manifest::{ModuleInfo, load_manifest};
use crate::publish::{Publisher, normalize_permissions};
use crate::response::ImportResponse;
use crate::workspace::ExtractionWorkspace;

/// Runs uploads through the import pipeline against one configuration.
#[derive(Debug, Clone)]
pub struct ModuleImporter {
    config: ImporterConfig,
    publisher: Publisher,
}

impl ModuleImporter {
    /// Create an importer for `config`.
    #[must_use]
    pub fn new(config: ImporterConfig) -> Self {
        let publisher = Publisher::new(config.modules_root.clone());
        Self { config, publisher }
    }

    /// Return the configuration in use.
    #[must_use]
    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    /// Import `upload` with the standard gzip extractor.
    ///
    /// # Errors
    ///
    /// Returns the [`ImportError`] of the first failing stage.
    pub fn import(&self, upload: &UploadedArchive) -> Result<ModuleInfo> {
        self.import_with(upload, &self.gzip_extractor())
    }

    /// Import `upload`, unpacking it with `extractor`.
    ///
    /// # Errors
    ///
    /// Returns the [`ImportError`] of the first failing stage.
    pub fn import_with(
        &self,
        upload: &UploadedArchive,
        extractor: &dyn ArchiveExtractor,
    ) -> Result<ModuleInfo> {
        let sniffed = validate_archive(upload, self.config.max_upload_size)?;
        log::debug!(
            "accepted upload {} ({} bytes, {})",
            upload.filename,
            upload.declared_size,
            sniffed.media_type()
        );

        let workspace = ExtractionWorkspace::create(&self.config.temp_root)?;
        let outcome = self.install(upload, &workspace, extractor);
        workspace.cleanup();
        outcome
    }

    fn install(
        &self,
        upload: &UploadedArchive,
        workspace: &ExtractionWorkspace,
        extractor: &dyn ArchiveExtractor,
    ) -> Result<ModuleInfo> {
        let module_root = extractor.extract(&upload.path, workspace.path())?;
        let manifest = load_manifest(&module_root)?;
        self.publisher.check_collision(&manifest.id)?;

        let installed = self.publisher.publish(&module_root, &manifest.id)?;
        log::info!("installed module {} into {installed}", manifest.id);

        // The module stays installed even if this fails.
        normalize_permissions(installed.as_std_path()).map_err(|e| {
            ImportError::unexpected(format!("failed to normalise permissions of {installed}: {e}"))
        })?;

        Ok(manifest.module_info())
    }

    /// Handle one upload request and build the caller-facing response.
    ///
    /// `upload` is `None` when the request carried no file. Callers that are
    /// not privileged administrators are refused before any stage runs.
    /// Panics inside the pipeline are reported as
    /// [`ImportError::UnexpectedError`].
    #[must_use]
    pub fn handle_upload(
        &self,
        upload: Option<&UploadedArchive>,
        is_privileged: bool,
    ) -> ImportResponse {
        self.handle_upload_with(upload, is_privileged, &self.gzip_extractor())
    }

    /// [`Self::handle_upload`] with a caller-supplied extractor.
    #[must_use]
    pub fn handle_upload_with(
        &self,
        upload: Option<&UploadedArchive>,
        is_privileged: bool,
        extractor: &dyn ArchiveExtractor,
    ) -> ImportResponse {
        let outcome = if !is_privileged {
            Err(ImportError::PermissionDenied)
        } else if let Some(upload) = upload {
            panic::catch_unwind(AssertUnwindSafe(|| self.import_with(upload, extractor)))
                .unwrap_or_else(|payload| Err(ImportError::unexpected(panic_detail(&*payload))))
        } else {
            Err(ImportError::NoFileUploaded)
        };

        if let Err(err) = &outcome {
            log_failure(err);
        }
        ImportResponse::from(outcome)
    }

    fn gzip_extractor(&self) -> GzipExtractor {
        GzipExtractor::new(self.config.max_extracted_size)
            .with_max_entries(self.config.max_entries)
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(
            || "import panicked".to_owned(),
            |msg| format!("import panicked: {msg}"),
        )
}

fn log_failure(err: &ImportError) {
    match (err, std::error::Error::source(err)) {
        (ImportError::UnexpectedError { detail }, _) => {
            log::warn!("module import failed [{}]: {detail}", err.code());
        }
        (_, Some(source)) => log::warn!("module import failed [{}]: {source}", err.code()),
        (_, None) => log::info!("module import rejected [{}]: {err}", err.code()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractionError, MockArchiveExtractor};
    use crate::test_support::{ImportFixture, module_package};
    use rstest::{fixture, rstest};
    use std::fs;
    use std::path::{Path, PathBuf};

    struct PanickingExtractor;

    impl ArchiveExtractor for PanickingExtractor {
        fn extract(&self, _: &Path, dest_dir: &Path) -> std::result::Result<PathBuf, ExtractionError> {
            fs::write(dest_dir.join("partial.php"), "<?php").expect("partial write");
            panic!("extractor exploded");
        }
    }

    #[fixture]
    fn fixture() -> ImportFixture {
        ImportFixture::new()
    }

    fn demo_upload(fixture: &ImportFixture) -> UploadedArchive {
        let path = fixture.upload("demo.tar.gz", &module_package("demo", "Demo"));
        UploadedArchive::from_path(&path, None).expect("upload")
    }

    #[rstest]
    fn unprivileged_callers_are_refused(fixture: ImportFixture) {
        let importer = ModuleImporter::new(fixture.config());
        let upload = demo_upload(&fixture);

        let response = importer.handle_upload(Some(&upload), false);

        assert!(!response.success);
        assert_eq!(response.message, ImportError::PermissionDenied.to_string());
        assert!(fixture.installed_entries().is_empty());
    }

    #[rstest]
    fn missing_upload_is_reported(fixture: ImportFixture) {
        let importer = ModuleImporter::new(fixture.config());

        let response = importer.handle_upload(None, true);

        assert!(!response.success);
        assert_eq!(response.message, ImportError::NoFileUploaded.to_string());
    }

    #[rstest]
    fn extractor_failure_cleans_workspace(fixture: ImportFixture) {
        let importer = ModuleImporter::new(fixture.config());
        let upload = demo_upload(&fixture);
        let mut extractor = MockArchiveExtractor::new();
        extractor
            .expect_extract()
            .times(1)
            .returning(|_, _| Err(ExtractionError::Io(std::io::Error::other("disk full"))));

        let result = importer.import_with(&upload, &extractor);

        assert!(matches!(result, Err(ImportError::ExtractionFailed { .. })));
        assert!(fixture.leftover_workspaces().is_empty());
        assert!(fixture.installed_entries().is_empty());
    }

    #[rstest]
    fn extractor_is_not_called_for_invalid_archives(fixture: ImportFixture) {
        let importer = ModuleImporter::new(fixture.config());
        let path = fixture.upload_bytes("demo.tar.gz", b"plain text, not gzip");
        let upload = UploadedArchive::from_path(&path, None).expect("upload");
        let mut extractor = MockArchiveExtractor::new();
        extractor.expect_extract().never();

        let result = importer.import_with(&upload, &extractor);

        assert!(matches!(result, Err(ImportError::InvalidContentType)));
        assert!(fixture.leftover_workspaces().is_empty());
    }

    #[rstest]
    fn panics_become_unexpected_errors(fixture: ImportFixture) {
        let importer = ModuleImporter::new(fixture.config());
        let upload = demo_upload(&fixture);

        let response = importer.handle_upload_with(Some(&upload), true, &PanickingExtractor);

        assert!(!response.success);
        assert_eq!(
            response.message,
            ImportError::unexpected("x").to_string(),
            "panic detail must not reach the caller"
        );
        assert!(fixture.leftover_workspaces().is_empty());
    }

    #[rstest]
    fn mocked_extraction_is_published(fixture: ImportFixture) {
        let importer = ModuleImporter::new(fixture.config());
        let upload = demo_upload(&fixture);
        let mut extractor = MockArchiveExtractor::new();
        extractor.expect_extract().returning(|_, dest: &Path| {
            let root = dest.join("custom");
            fs::create_dir_all(&root)?;
            fs::write(
                root.join("manifest.json"),
                r#"{"manifest_version":"2.0","id":"custom","name":"Custom","version":"3.1","namespace":"Custom","author":"Ops"}"#,
            )?;
            Ok(root)
        });

        let info = importer.import_with(&upload, &extractor).expect("import");

        assert_eq!(info.id, "custom");
        assert_eq!(info.author, "Ops");
        assert_eq!(fixture.installed_entries(), vec!["custom".to_owned()]);
        assert!(fixture.leftover_workspaces().is_empty());
    }

    #[rstest]
    fn successful_upload_builds_success_response(fixture: ImportFixture) {
        let importer = ModuleImporter::new(fixture.config());
        let upload = demo_upload(&fixture);

        let response = importer.handle_upload(Some(&upload), true);

        assert!(response.success, "unexpected failure: {}", response.message);
        assert_eq!(response.message, "Module \"Demo\" imported successfully!");
        let info = response.module_info.expect("module info");
        assert_eq!(info.id, "demo");
        assert_eq!(info.version, "1.0");
    }

    #[test]
    fn panic_detail_reads_string_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_detail(&*payload), "import panicked: boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_detail(&*payload), "import panicked");
    }
}
