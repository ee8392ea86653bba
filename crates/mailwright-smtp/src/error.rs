//! Error types for SMTP operations.

use crate::types::ReplyCode;
use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The TCP connection could not be established.
    #[error("Failed to connect to {address}: {source}")]
    Connection {
        /// `host:port` that was dialled.
        address: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The TLS handshake failed.
    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        /// Server name used for verification.
        host: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The host cannot be used as a TLS server name.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// The server answered a step with an unexpected reply code.
    #[error("Unexpected reply {code} to {step}: {message}")]
    UnexpectedReply {
        /// Protocol step that failed (e.g. `RCPT TO`).
        step: &'static str,
        /// Reply code received.
        code: ReplyCode,
        /// Reply text.
        message: String,
    },

    /// Malformed data from the server.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// None of the advertised mechanisms is supported.
    #[error("No supported authentication method (server offers: {advertised:?})")]
    AuthUnsupported {
        /// The server's AUTH extension argument.
        advertised: String,
    },

    /// The server rejected the credentials.
    #[error("Authentication with {mechanism} rejected ({code})")]
    AuthFailed {
        /// Mechanism that was attempted.
        mechanism: &'static str,
        /// Reply code received.
        code: ReplyCode,
    },

    /// An outbound line exceeds the negotiated buffer size.
    #[error("Data of {size} bytes exceeds server limit of {limit} bytes")]
    SizeLimitExceeded {
        /// Size of the line including CRLF.
        size: usize,
        /// Negotiated maximum.
        limit: usize,
    },

    /// TLS was requested on a connection that is already encrypted.
    #[error("Connection is already encrypted")]
    AlreadyEncrypted,

    /// The connection has been closed.
    #[error("Connection is closed")]
    Closed,
}

impl Error {
    /// Creates an unexpected-reply error for `step`.
    #[must_use]
    pub fn unexpected(step: &'static str, code: ReplyCode, message: impl Into<String>) -> Self {
        Self::UnexpectedReply {
            step,
            code,
            message: message.into(),
        }
    }

    /// Returns the server reply code carried by this error, if any.
    #[must_use]
    pub const fn reply_code(&self) -> Option<ReplyCode> {
        match self {
            Self::UnexpectedReply { code, .. } | Self::AuthFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.reply_code(), Some(code) if code.is_permanent())
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.reply_code(), Some(code) if code.is_transient())
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

    #[test]
    fn test_reply_code_classification() {
        let err = Error::unexpected("RCPT TO", ReplyCode::MAILBOX_UNAVAILABLE, "no such user");
        assert_eq!(err.reply_code(), Some(ReplyCode::MAILBOX_UNAVAILABLE));
        assert!(err.is_permanent());
        assert!(!err.is_transient());

        let err = Error::unexpected("MAIL FROM", ReplyCode::MAILBOX_BUSY, "try later");
        assert!(err.is_transient());
    }

    #[test]
    fn test_non_reply_errors_have_no_code() {
        let err = Error::SizeLimitExceeded {
            size: 10,
            limit: 5,
        };
        assert_eq!(err.reply_code(), None);
        assert!(!err.is_permanent());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_display() {
        let err = Error::unexpected("DATA", ReplyCode::new(451), "local error");
        assert_eq!(err.to_string(), "Unexpected reply 451 to DATA: local error");
    }
}
