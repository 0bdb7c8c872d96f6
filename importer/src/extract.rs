//! Safe extraction of `.tar.gz` module packages.
//!
//! Entries are unpacked into a caller-owned workspace directory. Every entry
//! path is checked before anything is written: absolute paths and `..`
//! components are refused so that no entry can land outside the workspace
//! (zip-slip). Only regular files and directories are materialised; links,
//! device nodes and FIFOs abort the extraction, because creating them would
//! open a second escape route. Permissions recorded in the archive are
//! ignored; the publisher normalises them after installation.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::EntryType;

use crate::config::MAX_ENTRIES;
use crate::manifest::MANIFEST_FILE;

/// Trait for extracting module packages, enabling test mocking.
///
/// # Examples
///
/// ```
/// use module_importer::extract::GzipExtractor;
///
/// let extractor = GzipExtractor::new(512 * 1024 * 1024);
/// // Use extractor.extract(archive_path, workspace_dir) in production
/// # let _ = extractor;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir` and return the
    /// module root inside it.
    ///
    /// See [`locate_module_root`] for how the module root is chosen.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape `dest_dir`, [`ExtractionError::UnsupportedEntry`] for links
    /// and special files, [`ExtractionError::SizeLimitExceeded`] when the
    /// unpacked content is too large, [`ExtractionError::EntryLimitExceeded`]
    /// when the archive holds too many entries, and [`ExtractionError::Io`] for
    /// corrupt streams and write failures.
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<PathBuf, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error while decoding the stream or writing entries.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive holds an entry that is neither a file nor a directory.
    #[error("unsupported {kind} entry: {path}")]
    UnsupportedEntry {
        /// The offending path from the archive entry.
        path: String,
        /// The tar entry type, for diagnostics.
        kind: String,
    },

    /// The files in the archive add up to more than the allowed size.
    #[error("extracted content exceeds {limit} bytes")]
    SizeLimitExceeded {
        /// The configured ceiling in bytes.
        limit: u64,
    },

    /// The archive holds more entries than allowed.
    #[error("archive holds more than {limit} entries")]
    EntryLimitExceeded {
        /// The configured entry ceiling.
        limit: u64,
    },
}

/// Byte and entry ceilings applied while unpacking.
#[derive(Debug, Clone, Copy)]
struct Budget {
    max_bytes: u64,
    max_entries: u64,
}

/// Default extractor using the `flate2` and `tar` crates.
#[derive(Debug, Clone, Copy)]
pub struct GzipExtractor {
    max_extracted_size: u64,
    max_entries: u64,
}

impl GzipExtractor {
    /// Create an extractor that refuses to write more than
    /// `max_extracted_size` bytes of file content.
    ///
    /// The entry ceiling defaults to [`MAX_ENTRIES`].
    #[must_use]
    pub const fn new(max_extracted_size: u64) -> Self {
        Self {
            max_extracted_size,
            max_entries: MAX_ENTRIES,
        }
    }

    /// Cap the number of files and directories the archive may create.
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }
}

impl ArchiveExtractor for GzipExtractor {
    fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<PathBuf, ExtractionError> {
        let file = File::open(archive_path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let budget = Budget {
            max_bytes: self.max_extracted_size,
            max_entries: self.max_entries,
        };
        let written = unpack_entries(decoder, dest_dir, budget)?;
        log::debug!("extracted {written} bytes into {}", dest_dir.display());
        locate_module_root(dest_dir)
    }
}

/// Unpack every entry of a tar stream below `dest_dir`.
///
/// Returns the number of file bytes written.
fn unpack_entries<R: Read>(
    reader: R,
    dest_dir: &Path,
    budget: Budget,
) -> Result<u64, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut written = 0_u64;
    let mut entries = 0_u64;

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();
        let entry_type = entry.header().entry_type();

        if is_metadata_record(entry_type) {
            continue;
        }

        let relative = validate_entry_path(&entry_path)?;

        entries += 1;
        if entries > budget.max_entries {
            return Err(ExtractionError::EntryLimitExceeded {
                limit: budget.max_entries,
            });
        }

        match entry_type {
            EntryType::Directory => {
                // `./` names the workspace itself.
                if !relative.as_os_str().is_empty() {
                    fs::create_dir_all(dest_dir.join(&relative))?;
                }
            }
            EntryType::Regular | EntryType::Continuous => {
                if relative.as_os_str().is_empty() {
                    return Err(traversal(&entry_path));
                }
                let dest_path = dest_dir.join(&relative);
                if let Some(parent) = dest_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let remaining = budget.max_bytes.saturating_sub(written);
                let mut output = File::create(&dest_path)?;
                let copied = io::copy(
                    &mut (&mut entry).take(remaining.saturating_add(1)),
                    &mut output,
                )?;
                written = written.saturating_add(copied);
                if written > budget.max_bytes {
                    return Err(ExtractionError::SizeLimitExceeded {
                        limit: budget.max_bytes,
                    });
                }
            }
            other => {
                return Err(ExtractionError::UnsupportedEntry {
                    path: entry_path.display().to_string(),
                    kind: format!("{other:?}"),
                });
            }
        }
    }

    Ok(written)
}

/// Return true for pax and GNU records that describe other entries.
fn is_metadata_record(entry_type: EntryType) -> bool {
    matches!(
        entry_type,
        EntryType::XGlobalHeader
            | EntryType::XHeader
            | EntryType::GNULongName
            | EntryType::GNULongLink
    )
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
///
/// Returns the path with `.` components removed. An empty result means the
/// entry names the destination itself.
fn validate_entry_path(path: &Path) -> Result<PathBuf, ExtractionError> {
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(traversal(path));
            }
        }
    }
    Ok(relative)
}

fn traversal(path: &Path) -> ExtractionError {
    ExtractionError::PathTraversal {
        path: path.display().to_string(),
    }
}

/// Pick the module root inside an extraction directory.
///
/// 1. A `manifest.json` directly in `dest_dir` makes `dest_dir` the root.
/// 2. Otherwise, exactly one top-level directory is the root; loose files
///    such as a `README.md` next to it are ignored.
/// 3. Any other layout falls back to `dest_dir`.
///
/// # Errors
///
/// Returns [`ExtractionError::Io`] if the directory cannot be listed.
pub fn locate_module_root(dest_dir: &Path) -> Result<PathBuf, ExtractionError> {
    if dest_dir.join(MANIFEST_FILE).is_file() {
        return Ok(dest_dir.to_path_buf());
    }

    let mut dirs = Vec::new();
    for entry in fs::read_dir(dest_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }

    match dirs.as_slice() {
        [only] => Ok(only.clone()),
        _ => Ok(dest_dir.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::PackageBuilder;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const LIMIT: u64 = 1024 * 1024;

    struct Scratch {
        _temp: TempDir,
        archive: PathBuf,
        dest: PathBuf,
    }

    #[fixture]
    fn scratch() -> Scratch {
        let temp = tempfile::tempdir().expect("temp dir");
        let archive = temp.path().join("upload.tar.gz");
        let dest = temp.path().join("workspace");
        fs::create_dir_all(&dest).expect("create dest");
        Scratch {
            _temp: temp,
            archive,
            dest,
        }
    }

    fn extract(scratch: &Scratch, package: &PackageBuilder) -> Result<PathBuf, ExtractionError> {
        package.write_to(&scratch.archive);
        GzipExtractor::new(LIMIT).extract(&scratch.archive, &scratch.dest)
    }

    #[rstest]
    fn single_top_level_directory_becomes_module_root(scratch: Scratch) {
        let package = PackageBuilder::new()
            .dir("demo")
            .file("demo/manifest.json", "{}")
            .file("demo/actions/Action.php", "<?php");

        let root = extract(&scratch, &package).expect("extract");

        assert_eq!(root, scratch.dest.join("demo"));
        assert!(root.join("actions/Action.php").is_file());
    }

    #[rstest]
    fn flat_archive_uses_workspace_as_module_root(scratch: Scratch) {
        let package = PackageBuilder::new()
            .file("manifest.json", "{}")
            .file("assets/js/app.js", "init();");

        let root = extract(&scratch, &package).expect("extract");

        assert_eq!(root, scratch.dest);
        assert!(root.join("manifest.json").is_file());
    }

    #[rstest]
    fn leading_dot_entries_are_accepted(scratch: Scratch) {
        let package = PackageBuilder::new()
            .dir("./")
            .file("./manifest.json", "{}");

        let root = extract(&scratch, &package).expect("extract");

        assert_eq!(root, scratch.dest);
        assert!(root.join("manifest.json").is_file());
    }

    #[rstest]
    fn files_without_directory_entries_get_parents(scratch: Scratch) {
        let package = PackageBuilder::new().file("demo/views/view.php", "<?php");

        let root = extract(&scratch, &package).expect("extract");

        assert_eq!(root, scratch.dest.join("demo"));
        assert!(root.join("views/view.php").is_file());
    }

    #[rstest]
    #[case::directory_and_readme(
        PackageBuilder::new()
            .file("demo/manifest.json", "{}")
            .file("README.md", "readme"),
        "demo"
    )]
    #[case::flat_manifest_and_one_subdirectory(
        PackageBuilder::new()
            .file("manifest.json", "{}")
            .file("views/view.php", "<?php"),
        ""
    )]
    #[case::two_directories(
        PackageBuilder::new()
            .file("demo/manifest.json", "{}")
            .file("other/manifest.json", "{}"),
        ""
    )]
    fn module_root_follows_package_layout(
        scratch: Scratch,
        #[case] package: PackageBuilder,
        #[case] expected: &str,
    ) {
        let root = extract(&scratch, &package).expect("extract");

        assert_eq!(root, scratch.dest.join(expected));
    }

    #[rstest]
    #[case::parent_dir("../../etc/passwd")]
    #[case::nested_parent("demo/../../escape.txt")]
    #[case::absolute("/etc/passwd")]
    fn traversal_entries_abort_extraction(scratch: Scratch, #[case] name: &str) {
        let package = PackageBuilder::new()
            .file("demo/manifest.json", "{}")
            .raw_file(name, "owned");

        let result = extract(&scratch, &package);

        assert!(
            matches!(result, Err(ExtractionError::PathTraversal { .. })),
            "expected PathTraversal for {name}, got {result:?}"
        );
        let outside = scratch.dest.parent().expect("dest has parent");
        assert!(!outside.join("escape.txt").exists());
    }

    #[rstest]
    fn symlink_entries_are_refused(scratch: Scratch) {
        let package = PackageBuilder::new()
            .file("demo/manifest.json", "{}")
            .symlink("demo/passwd", "/etc/passwd");

        let result = extract(&scratch, &package);

        assert!(matches!(result, Err(ExtractionError::UnsupportedEntry { .. })));
        assert!(fs::symlink_metadata(scratch.dest.join("demo/passwd")).is_err());
    }

    #[rstest]
    fn hard_link_entries_are_refused(scratch: Scratch) {
        let package = PackageBuilder::new()
            .file("demo/manifest.json", "{}")
            .hard_link("demo/copy.json", "demo/manifest.json");

        let result = extract(&scratch, &package);

        assert!(matches!(result, Err(ExtractionError::UnsupportedEntry { .. })));
    }

    #[rstest]
    fn corrupt_stream_is_an_io_error(scratch: Scratch) {
        let mut bytes = PackageBuilder::new()
            .file("demo/manifest.json", "{\"id\":\"demo\"}")
            .to_bytes();
        bytes.truncate(20);
        fs::write(&scratch.archive, &bytes).expect("write archive");

        let result = GzipExtractor::new(LIMIT).extract(&scratch.archive, &scratch.dest);

        assert!(matches!(result, Err(ExtractionError::Io(_))));
    }

    #[rstest]
    fn oversized_content_is_refused(scratch: Scratch) {
        let package = PackageBuilder::new().file("demo/blob.bin", vec![0_u8; 4096]);
        package.write_to(&scratch.archive);

        let result = GzipExtractor::new(1024).extract(&scratch.archive, &scratch.dest);

        assert!(matches!(
            result,
            Err(ExtractionError::SizeLimitExceeded { limit: 1024 })
        ));
    }

    #[rstest]
    fn content_exactly_at_limit_is_accepted(scratch: Scratch) {
        let package = PackageBuilder::new().file("demo/blob.bin", vec![0_u8; 1024]);
        package.write_to(&scratch.archive);

        let result = GzipExtractor::new(1024).extract(&scratch.archive, &scratch.dest);

        assert!(result.is_ok(), "expected success, got {result:?}");
    }

    #[rstest]
    fn directory_flood_hits_entry_limit(scratch: Scratch) {
        let package = (0..16).fold(PackageBuilder::new().dir("demo"), |package, n| {
            package.dir(&format!("demo/d{n}"))
        });
        package.write_to(&scratch.archive);

        let result = GzipExtractor::new(LIMIT)
            .with_max_entries(8)
            .extract(&scratch.archive, &scratch.dest);

        assert!(matches!(
            result,
            Err(ExtractionError::EntryLimitExceeded { limit: 8 })
        ));
    }

    #[rstest]
    fn entry_count_at_limit_is_accepted(scratch: Scratch) {
        let package = PackageBuilder::new()
            .dir("demo")
            .file("demo/manifest.json", "{}")
            .file("demo/Module.php", "<?php");
        package.write_to(&scratch.archive);

        let result = GzipExtractor::new(LIMIT)
            .with_max_entries(3)
            .extract(&scratch.archive, &scratch.dest);

        assert!(result.is_ok(), "expected success, got {result:?}");
    }

    #[rstest]
    #[case::plain("lib/module.php", "lib/module.php")]
    #[case::dotted("./lib/./module.php", "lib/module.php")]
    #[case::root_dot("./", "")]
    fn normalises_safe_paths(#[case] input: &str, #[case] expected: &str) {
        let relative = validate_entry_path(Path::new(input)).expect("safe path");
        assert_eq!(relative, PathBuf::from(expected));
    }

    #[test]
    fn empty_workspace_is_its_own_module_root() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = locate_module_root(temp.path()).expect("root");
        assert_eq!(root, temp.path());
    }

    #[test]
    fn lone_file_keeps_workspace_as_module_root() {
        let temp = tempfile::tempdir().expect("temp dir");
        fs::write(temp.path().join("manifest.json"), "{}").expect("write");
        let root = locate_module_root(temp.path()).expect("root");
        assert_eq!(root, temp.path());
    }
}
