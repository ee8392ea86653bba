//! SMTP reply types.

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code, taken from the last line.
    pub code: ReplyCode,
    /// Trimmed text of every line, code and separator removed.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// The reply produced when the server sent nothing before closing.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            code: ReplyCode::NONE,
            message: Vec::new(),
        }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the lines joined with CRLF.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\r\n")
    }
}

/// SMTP reply code.
///
/// [`ReplyCode::NONE`] (`-1`) stands for "no reply": the stream closed
/// before a single line arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(i16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: i16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        self.0
    }

    /// Returns true if this is the no-reply sentinel.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Reply codes used by the client
impl ReplyCode {
    /// -1 No reply (connection closed)
    pub const NONE: Self = Self(-1);
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 251 User not local; will forward
    pub const FORWARD: Self = Self(251);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 552 Exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);
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

    mod reply_code_tests {
        use super::*;

        #[test]
        fn classes() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::AUTH_SUCCESS.is_success());
            assert!(ReplyCode::AUTH_CONTINUE.is_intermediate());
            assert!(ReplyCode::START_DATA.is_intermediate());
            assert!(ReplyCode::MAILBOX_BUSY.is_transient());
            assert!(ReplyCode::AUTH_FAILED.is_permanent());
        }

        #[test]
        fn sentinel_is_in_no_class() {
            let none = ReplyCode::NONE;
            assert!(none.is_none());
            assert!(!none.is_success());
            assert!(!none.is_intermediate());
            assert!(!none.is_transient());
            assert!(!none.is_permanent());
            assert_eq!(none.to_string(), "-1");
        }

        #[test]
        fn ordering() {
            assert!(ReplyCode::NONE < ReplyCode::OK);
            assert!(ReplyCode::OK < ReplyCode::MAILBOX_BUSY);
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn message_text_joins_with_crlf() {
            let reply = Reply::new(ReplyCode::OK, vec!["foo".to_string(), "bar".to_string()]);
            assert_eq!(reply.message_text(), "foo\r\nbar");
        }

        #[test]
        fn none_reply() {
            let reply = Reply::none();
            assert_eq!(reply.code, ReplyCode::NONE);
            assert_eq!(reply.message_text(), "");
            assert!(!reply.is_success());
        }

        #[test]
        fn error_classes() {
            let reply = Reply::new(ReplyCode::MAILBOX_UNAVAILABLE, vec!["Not found".to_string()]);
            assert!(reply.is_permanent_error());
            assert!(!reply.is_transient_error());
        }
    }
}
