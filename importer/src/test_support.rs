//! Shared test utilities for the importer crate.
//!
//! Available to unit tests and, through the `test-support` feature, to
//! integration tests. Nothing here is used by production code.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};
use tempfile::TempDir;

use crate::config::ImporterConfig;

#[derive(Debug, Clone)]
struct FixtureEntry {
    name: String,
    kind: EntryType,
    contents: Vec<u8>,
    link: Option<String>,
}

/// Builder for `.tar.gz` packages, including hostile ones.
///
/// Entry names are written into the tar header verbatim, so `..` and
/// absolute names survive into the archive exactly as an attacker would
/// craft them.
#[derive(Debug, Clone, Default)]
pub struct PackageBuilder {
    entries: Vec<FixtureEntry>,
}

impl PackageBuilder {
    /// Start an empty package.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, kind: EntryType, contents: Vec<u8>, link: Option<&str>) -> Self {
        self.entries.push(FixtureEntry {
            name: name.to_owned(),
            kind,
            contents,
            link: link.map(str::to_owned),
        });
        self
    }

    /// Add a regular file.
    #[must_use]
    pub fn file(self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.push(name, EntryType::Regular, contents.into(), None)
    }

    /// Add a regular file whose name is taken as-is, e.g. `../../etc/passwd`.
    #[must_use]
    pub fn raw_file(self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.file(name, contents)
    }

    /// Add a directory entry.
    #[must_use]
    pub fn dir(self, name: &str) -> Self {
        self.push(name, EntryType::Directory, Vec::new(), None)
    }

    /// Add a symbolic link pointing at `target`.
    #[must_use]
    pub fn symlink(self, name: &str, target: &str) -> Self {
        self.push(name, EntryType::Symlink, Vec::new(), Some(target))
    }

    /// Add a hard link pointing at `target`.
    #[must_use]
    pub fn hard_link(self, name: &str, target: &str) -> Self {
        self.push(name, EntryType::Link, Vec::new(), Some(target))
    }

    /// Encode the package as gzip-compressed tar bytes.
    ///
    /// # Panics
    ///
    /// Panics if an entry name or link target exceeds 100 bytes, or if
    /// encoding fails.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for entry in &self.entries {
            let header = raw_header(entry);
            builder
                .append(&header, entry.contents.as_slice())
                .expect("append fixture entry");
        }

        builder
            .into_inner()
            .expect("finish tar stream")
            .finish()
            .expect("finish gzip stream")
    }

    /// Write the package to `path` and return the path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> PathBuf {
        let mut file = fs::File::create(path).expect("create fixture archive");
        file.write_all(&self.to_bytes())
            .expect("write fixture archive");
        path.to_path_buf()
    }
}

fn raw_header(entry: &FixtureEntry) -> Header {
    let mut header = Header::new_gnu();
    write_field(&mut header.as_old_mut().name, &entry.name);
    if let Some(link) = &entry.link {
        write_field(&mut header.as_old_mut().linkname, link);
    }
    let mode = if entry.kind == EntryType::Directory {
        0o755
    } else {
        0o644
    };
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_entry_type(entry.kind);
    header.set_size(entry.contents.len() as u64);
    header.set_cksum();
    header
}

fn write_field(field: &mut [u8; 100], value: &str) {
    let bytes = value.as_bytes();
    field
        .get_mut(..bytes.len())
        .expect("fixture names fit in 100 bytes")
        .copy_from_slice(bytes);
}

/// Render a manifest with the four mandatory identity fields.
#[must_use]
pub fn manifest_json(id: &str, name: &str, version: &str, namespace: &str) -> String {
    serde_json::json!({
        "manifest_version": 2.0,
        "id": id,
        "name": name,
        "version": version,
        "namespace": namespace,
    })
    .to_string()
}

/// A package for module `id` with its files under a single `id/` directory.
#[must_use]
pub fn module_package(id: &str, namespace: &str) -> PackageBuilder {
    PackageBuilder::new()
        .dir(id)
        .file(
            &format!("{id}/manifest.json"),
            manifest_json(id, "Demo", "1.0", namespace),
        )
        .file(&format!("{id}/Module.php"), "<?php\n")
}

/// Isolated modules root, temporary root and upload directory.
pub struct ImportFixture {
    _temp: TempDir,
    /// Directory standing in for the installed modules root.
    pub modules_root: Utf8PathBuf,
    /// Directory standing in for the workspace parent.
    pub temp_root: Utf8PathBuf,
    /// Directory for uploaded archives.
    pub uploads: PathBuf,
}

impl ImportFixture {
    /// Create the three directories under a fresh temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the directories cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("temp dir");
        let base = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 temp path");
        let modules_root = base.join("modules");
        let temp_root = base.join("import-tmp");
        let uploads = temp.path().join("uploads");
        for dir in [modules_root.as_std_path(), temp_root.as_std_path(), uploads.as_path()] {
            fs::create_dir_all(dir).expect("create fixture dir");
        }
        Self {
            _temp: temp,
            modules_root,
            temp_root,
            uploads,
        }
    }

    /// Configuration pointing at this fixture's directories.
    #[must_use]
    pub fn config(&self) -> ImporterConfig {
        ImporterConfig::with_roots(self.modules_root.clone(), self.temp_root.clone())
    }

    /// Write `package` into the upload directory under `filename`.
    #[must_use]
    pub fn upload(&self, filename: &str, package: &PackageBuilder) -> PathBuf {
        package.write_to(&self.uploads.join(filename))
    }

    /// Write raw bytes into the upload directory under `filename`.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn upload_bytes(&self, filename: &str, bytes: &[u8]) -> PathBuf {
        let path = self.uploads.join(filename);
        fs::write(&path, bytes).expect("write upload");
        path
    }

    /// Names of entries left in the temporary root.
    #[must_use]
    pub fn leftover_workspaces(&self) -> Vec<String> {
        entry_names(self.temp_root.as_std_path())
    }

    /// Names of entries in the modules root.
    #[must_use]
    pub fn installed_entries(&self) -> Vec<String> {
        entry_names(self.modules_root.as_std_path())
    }
}

impl Default for ImportFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
