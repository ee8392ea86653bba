//! File attachments.

use crate::content_type::ContentType;
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Maximum cumulative size of all attachments on one message (10 MiB).
pub const ATTACHMENT_LIMIT: u64 = 10 * 1024 * 1024;

/// A file admitted as an attachment.
///
/// Only metadata is captured at admission time. The content is read when the
/// message is composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    path: PathBuf,
    name: String,
    size: u64,
    content_type: ContentType,
}

impl Attachment {
    /// Admits a file as an attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is a directory or cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let unreadable = |source| Error::UnreadableAttachment {
            path: path.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(path).map_err(unreadable)?;
        if metadata.is_dir() {
            return Err(Error::AttachmentIsDirectory {
                path: path.to_path_buf(),
            });
        }
        File::open(path).map_err(unreadable)?;

        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            content_type: ContentType::guess_from_path(path),
        })
    }

    /// Returns the path the attachment is read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the display name (the file's base name).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the size in bytes recorded at admission.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the detected content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Reads the current file content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can no longer be read.
    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|source| Error::UnreadableAttachment {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_path_captures_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        File::create(&path).unwrap().write_all(b"%PDF-1.4").unwrap();

        let attachment = Attachment::from_path(&path).unwrap();
        assert_eq!(attachment.name(), "report.pdf");
        assert_eq!(attachment.size(), 8);
        assert_eq!(attachment.content_type().essence(), "application/pdf");
        assert_eq!(attachment.read().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_from_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = Attachment::from_path(dir.path()).unwrap_err();
        assert!(matches!(err, Error::AttachmentIsDirectory { .. }));
        assert_eq!(err.path(), Some(dir.path()));
    }

    #[test]
    fn test_from_path_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Attachment::from_path(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, Error::UnreadableAttachment { .. }));
    }

    #[test]
    fn test_read_after_removal_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        fs::write(&path, "soon gone").unwrap();
        let attachment = Attachment::from_path(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(attachment.read().is_err());
    }
}
