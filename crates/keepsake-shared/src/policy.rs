//! File acceptance policy and storage-key naming for guest uploads.

use crate::constants::{DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_UPLOAD_FORMATS, GUEST_UPLOAD_PREFIX};
use crate::error::UploadError;
use crate::types::RawFile;

/// Which files a guest may upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Lowercase extensions without the leading dot.
    pub allowed_formats: Vec<String>,
    /// Per-file cap in bytes.
    pub max_size: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_formats: DEFAULT_UPLOAD_FORMATS.iter().map(|s| s.to_string()).collect(),
            max_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

impl UploadPolicy {
    /// Parse a comma list such as `"jpg, PNG,.webp"`. Blank entries are dropped.
    pub fn parse_formats(list: &str) -> Vec<String> {
        list.split(',')
            .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Check a file against the allow-list and size cap, returning its
    /// lowercase extension on success.
    pub fn validate(&self, file: &RawFile) -> Result<String, UploadError> {
        let extension = extension_of(&file.original_name).ok_or(UploadError::MissingExtension)?;

        if !self.allowed_formats.iter().any(|f| *f == extension) {
            return Err(UploadError::UnsupportedFormat {
                extension,
                allowed: self.allowed_formats.join(", "),
            });
        }
        if file.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if file.bytes.len() > self.max_size {
            return Err(UploadError::TooLarge {
                size: file.bytes.len(),
                max: self.max_size,
            });
        }

        Ok(extension)
    }
}

/// Lowercase extension of a file name, if it has a non-empty one.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || ext.contains(['/', '\\']) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Keep only ASCII alphanumerics of a display name.
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// `guest-uploads/<sanitized name>_<millis>.<ext>`
///
/// Two uploads from the same sanitized name in the same millisecond map to
/// the same key.
pub fn storage_key(uploader_name: &str, timestamp_millis: i64, extension: &str) -> String {
    format!(
        "{GUEST_UPLOAD_PREFIX}{}_{timestamp_millis}.{extension}",
        sanitize_name(uploader_name)
    )
}
