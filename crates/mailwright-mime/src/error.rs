//! Error types for message composition.

use std::io;
use std::path::PathBuf;

/// Result type alias for composition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Composition error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Attachment path could not be read.
    #[error("Unable to read file: {}", path.display())]
    UnreadableAttachment {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Attachment path points at a directory.
    #[error("Unable to read file: {} is a directory", path.display())]
    AttachmentIsDirectory {
        /// Offending path.
        path: PathBuf,
    },

    /// Adding the attachment would exceed the cumulative size cap.
    #[error("Total attachment size too large: {total} bytes exceeds limit of {limit}")]
    AttachmentLimitExceeded {
        /// Cumulative size including the rejected attachment.
        total: u64,
        /// Maximum cumulative size.
        limit: u64,
    },
}

impl Error {
    /// Returns the path of the attachment this error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::UnreadableAttachment { path, .. } | Self::AttachmentIsDirectory { path } => {
                Some(path)
            }
            Self::AttachmentLimitExceeded { .. } => None,
        }
    }
}
