//! Uploaded archive validation.
//!
//! Checks the declared filename, the actual content type (by magic bytes,
//! never by extension), and the declared size of an upload before anything
//! is unpacked. All checks are read-only.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{ImportError, Result};

/// Filename suffixes accepted for uploads, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 2] = [".tar.gz", ".tgz"];

/// Gzip member header: ID1, ID2, CM=deflate.
pub const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;
const SNIFF_LEN: u64 = 512;

/// Media type discovered by inspecting the first bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedType {
    /// A gzip stream (`application/gzip`).
    Gzip,
    /// An uncompressed POSIX tar archive (`application/x-tar`).
    Tar,
    /// Anything else, including empty files.
    Unknown,
}

impl SniffedType {
    /// Return the conventional media type string.
    #[must_use]
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Gzip => "application/gzip",
            Self::Tar => "application/x-tar",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Return true when the extractor can consume this type.
    #[must_use]
    pub fn is_compressed_tar(self) -> bool {
        matches!(self, Self::Gzip)
    }
}

/// An uploaded file as handed over by the host layer.
///
/// The bytes already sit in a temporary file owned by the host; this type
/// only records where they are and what the client claimed about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArchive {
    /// Filename declared by the client.
    pub filename: String,
    /// Location of the received bytes.
    pub path: PathBuf,
    /// Size declared by the client, in bytes.
    pub declared_size: u64,
}

impl UploadedArchive {
    /// Describe an upload whose metadata came from the host layer.
    #[must_use]
    pub fn new(filename: impl Into<String>, path: impl Into<PathBuf>, declared_size: u64) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
            declared_size,
        }
    }

    /// Describe a file already on disk, taking its size from metadata.
    ///
    /// When `filename` is `None`, the file name component of `path` is used.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::NoFileUploaded`] if `path` does not name a
    /// readable regular file.
    pub fn from_path(path: &Path, filename: Option<&str>) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            log::warn!("upload {} is unavailable: {e}", path.display());
            ImportError::NoFileUploaded
        })?;
        if !metadata.is_file() {
            return Err(ImportError::NoFileUploaded);
        }

        let declared = match filename {
            Some(name) => name.to_owned(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or(ImportError::NoFileUploaded)?,
        };

        Ok(Self::new(declared, path, metadata.len()))
    }
}

/// Reject filenames that do not end in an allowed suffix.
///
/// # Errors
///
/// Returns [`ImportError::InvalidExtension`] for any other name.
///
/// # Examples
///
/// ```
/// use module_importer::archive::validate_extension;
///
/// assert!(validate_extension("monitoring.TGZ").is_ok());
/// assert!(validate_extension("monitoring.zip").is_err());
/// ```
pub fn validate_extension(filename: &str) -> Result<()> {
    let lowered = filename.to_ascii_lowercase();
    if ALLOWED_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext)) {
        Ok(())
    } else {
        Err(ImportError::InvalidExtension)
    }
}

/// Determine the media type of the file at `path` from its leading bytes.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub fn sniff_content_type(path: &Path) -> std::io::Result<SniffedType> {
    let mut head = Vec::new();
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut head)?;
    Ok(sniff_bytes(&head))
}

/// Classify a buffer holding the first bytes of a file.
#[must_use]
pub fn sniff_bytes(head: &[u8]) -> SniffedType {
    if head.starts_with(&GZIP_MAGIC) {
        return SniffedType::Gzip;
    }
    let tar_magic = head.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len());
    if tar_magic == Some(TAR_MAGIC) {
        return SniffedType::Tar;
    }
    SniffedType::Unknown
}

/// Reject files whose content is not a gzip stream.
///
/// # Errors
///
/// Returns [`ImportError::InvalidContentType`] if the sniffed type is not
/// accepted or the file cannot be read.
pub fn validate_content_type(path: &Path) -> Result<SniffedType> {
    let sniffed = sniff_content_type(path).map_err(|e| {
        log::warn!("cannot read upload {} for sniffing: {e}", path.display());
        ImportError::InvalidContentType
    })?;
    log::debug!("sniffed upload content as {}", sniffed.media_type());
    if sniffed.is_compressed_tar() {
        Ok(sniffed)
    } else {
        Err(ImportError::InvalidContentType)
    }
}

/// Reject declared sizes above `max_size`.
///
/// # Errors
///
/// Returns [`ImportError::FileTooLarge`] when `declared_size > max_size`.
pub fn validate_size(declared_size: u64, max_size: u64) -> Result<()> {
    if declared_size > max_size {
        return Err(ImportError::FileTooLarge {
            limit: format_bytes(max_size),
        });
    }
    Ok(())
}

/// Run every archive check in order: extension, content type, size.
///
/// # Errors
///
/// Returns the first failing check's error.
pub fn validate_archive(upload: &UploadedArchive, max_size: u64) -> Result<SniffedType> {
    validate_extension(&upload.filename)?;
    let sniffed = validate_content_type(&upload.path)?;
    validate_size(upload.declared_size, max_size)?;
    Ok(sniffed)
}

/// Format a byte count for humans using binary units.
///
/// Values are rounded to at most two decimals and trailing zeros are
/// dropped.
///
/// # Examples
///
/// ```
/// use module_importer::archive::format_bytes;
///
/// assert_eq!(format_bytes(52_428_800), "50 MB");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// assert_eq!(format_bytes(512), "512 B");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut whole = bytes;
    let mut remainder = 0_u64;
    let mut unit = 0_usize;
    while whole >= 1024 && unit < UNITS.len() - 1 {
        remainder = whole % 1024;
        whole /= 1024;
        unit += 1;
    }

    // Hundredths of the current unit, rounded half up.
    let hundredths = (remainder * 100 + 512) / 1024;
    let (whole, hundredths) = if hundredths == 100 {
        (whole + 1, 0)
    } else {
        (whole, hundredths)
    };

    let suffix = UNITS.get(unit).copied().unwrap_or("GB");
    match hundredths {
        0 => format!("{whole} {suffix}"),
        h if h % 10 == 0 => format!("{whole}.{} {suffix}", h / 10),
        h => format!("{whole}.{h:02} {suffix}"),
    }
}
