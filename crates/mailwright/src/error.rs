//! Error types for the mailer facade.

use std::convert::Infallible;

/// Errors that can occur while composing or delivering mail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// SMTP session or transaction failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] mailwright_smtp::Error),

    /// Message composition failed.
    #[error("Message error: {0}")]
    Mime(#[from] mailwright_mime::Error),
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl Error {
    /// Returns true if retrying later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Smtp(e) => e.is_transient(),
            Self::Mime(_) => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
