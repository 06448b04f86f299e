//! File selection, acceptance checks, and reading into an [`ImageDatum`]

use image::ImageFormat;
use poet_types::{is_image_mime, ImageDatum, Result, ValidationError, MAX_UPLOAD_MB};
use std::path::{Path, PathBuf};

/// Where the selected file's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A file chosen by the user, before it has been read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub source: FileSource,
}

impl FileSelection {
    /// Describe a file on disk; MIME type is inferred from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            size: metadata.len(),
            mime_type: mime_for_path(path).to_string(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            size: bytes.len() as u64,
            mime_type: mime_type.to_string(),
            source: FileSource::Memory(bytes),
        }
    }
}

/// MIME type for a path's extension
pub fn mime_for_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Accept guard for a selected file.
///
/// Pure: the same selection always gets the same answer.
pub fn check_file(file: &FileSelection, max_bytes: u64) -> std::result::Result<(), ValidationError> {
    check_size(file.size, max_bytes)?;
    if !is_image_mime(&file.mime_type) {
        return Err(ValidationError::InvalidFileType(file.mime_type.clone()));
    }
    Ok(())
}

fn check_size(size: u64, max_bytes: u64) -> std::result::Result<(), ValidationError> {
    if size > max_bytes {
        return Err(ValidationError::FileTooLarge {
            size,
            limit_mb: limit_mb(max_bytes),
        });
    }
    Ok(())
}

fn limit_mb(max_bytes: u64) -> u64 {
    if max_bytes == MAX_UPLOAD_MB * 1024 * 1024 {
        return MAX_UPLOAD_MB;
    }
    (max_bytes / (1024 * 1024)).max(1)
}

/// Read a selection into a data URI.
///
/// The size limit is checked again against the bytes actually read, since
/// `size` may be stale. The MIME type is sniffed from the content when
/// possible, falling back to the declared type.
pub async fn read_selection(file: &FileSelection, max_bytes: u64) -> Result<ImageDatum> {
    let bytes = match &file.source {
        FileSource::Path(path) => tokio::fs::read(path).await?,
        FileSource::Memory(bytes) => bytes.clone(),
    };
    check_size(bytes.len() as u64, max_bytes)?;

    let mime_type: &str = match image::guess_format(&bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => &file.mime_type,
    };

    Ok(ImageDatum::from_bytes(mime_type, &bytes)?)
}
