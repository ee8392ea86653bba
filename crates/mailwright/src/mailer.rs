//! Transport registry and mailer handle.

use mailwright_mime::{Email, Headers, MockTransport, Transport};
use mailwright_smtp::{SmtpConfig, SmtpTransport};

use crate::error::{Error, Result};

/// Selects the transport a [`Mailer`] delivers through.
#[derive(Debug, Clone)]
pub enum TransportConfig {
    /// Deliver over an SMTP session.
    Smtp(SmtpConfig),
    /// Record messages in memory.
    Mock,
}

/// A loaded transport.
#[derive(Debug)]
pub enum MailTransport {
    /// Established SMTP session.
    Smtp(SmtpTransport),
    /// Recording transport.
    Mock(MockTransport),
}

impl Transport for MailTransport {
    type Error = Error;

    fn send(
        &mut self,
        from: &str,
        recipients: &[String],
        message: &str,
        headers: &Headers,
    ) -> Result<()> {
        match self {
            Self::Smtp(smtp) => smtp.send(from, recipients, message, headers)?,
            Self::Mock(mock) => mock.send(from, recipients, message, headers)?,
        }
        Ok(())
    }
}

/// Sends mail from a fixed sender through one transport.
///
/// # Example
///
/// ```
/// use mailwright::{Mailer, TransportConfig};
///
/// let mut mailer = Mailer::load(&TransportConfig::Mock, "Forum <forum@example.com>").unwrap();
/// mailer
///     .new_email(Some("Welcome"), Some("Thanks for registering."))
///     .send(&["new.member@example.com"], &[], &[])
///     .unwrap();
///
/// let sent = mailer.mock().unwrap().last().unwrap();
/// assert_eq!(sent.from, "forum@example.com");
/// ```
#[derive(Debug)]
pub struct Mailer {
    from: String,
    transport: MailTransport,
}

impl Mailer {
    /// Instantiates the configured transport.
    ///
    /// For SMTP this connects and completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP session cannot be established.
    pub fn load(config: &TransportConfig, from: impl Into<String>) -> Result<Self> {
        let transport = match config {
            TransportConfig::Smtp(smtp) => MailTransport::Smtp(SmtpTransport::connect(smtp)?),
            TransportConfig::Mock => MailTransport::Mock(MockTransport::new()),
        };
        Ok(Self::with_transport(transport, from))
    }

    /// Wraps an already constructed transport.
    #[must_use]
    pub fn with_transport(transport: MailTransport, from: impl Into<String>) -> Self {
        let from = from.into();
        tracing::debug!(%from, mock = matches!(transport, MailTransport::Mock(_)), "Mailer loaded");
        Self { from, transport }
    }

    /// Starts a new email from the mailer's sender.
    pub fn new_email(&mut self, subject: Option<&str>, body: Option<&str>) -> Email<'_, Self> {
        let from = self.from.clone();
        let mut email = Email::new(&from, self);
        if let Some(subject) = subject {
            email = email.subject(subject);
        }
        if let Some(body) = body {
            email = email.body(body);
        }
        email
    }

    /// Returns the configured sender.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.from
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &MailTransport {
        &self.transport
    }

    /// Returns the recording transport, if that is what was loaded.
    #[must_use]
    pub const fn mock(&self) -> Option<&MockTransport> {
        match &self.transport {
            MailTransport::Mock(mock) => Some(mock),
            MailTransport::Smtp(_) => None,
        }
    }

    /// Ends the SMTP session, if any. Errors are logged and ignored.
    pub fn close(&mut self) {
        if let MailTransport::Smtp(smtp) = &mut self.transport {
            smtp.close();
        }
    }
}

impl Transport for Mailer {
    type Error = Error;

    fn send(
        &mut self,
        from: &str,
        recipients: &[String],
        message: &str,
        headers: &Headers,
    ) -> Result<()> {
        self.transport.send(from, recipients, message, headers)
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

    fn mock_mailer() -> Mailer {
        Mailer::load(&TransportConfig::Mock, "noreply@forum.example").unwrap()
    }

    #[test]
    fn test_new_email_prefills() {
        let mut mailer = mock_mailer();
        mailer
            .new_email(Some("subject"), Some("message"))
            .send(&["b@x.com"], &[], &[])
            .unwrap();

        let sent = mailer.mock().unwrap().last().unwrap();
        assert_eq!(sent.from, "noreply@forum.example");
        assert_eq!(sent.headers.get("Subject"), Some("subject"));
        assert_eq!(sent.message, "message");
    }

    #[test]
    fn test_new_email_without_subject() {
        let mut mailer = mock_mailer();
        mailer
            .new_email(None, None)
            .send(&["b@x.com"], &[], &[])
            .unwrap();

        let sent = mailer.mock().unwrap().last().unwrap();
        assert!(!sent.headers.contains("Subject"));
        assert_eq!(sent.message, "");
    }

    #[test]
    fn test_display_name_sender() {
        let mut mailer = Mailer::load(&TransportConfig::Mock, "Forum <forum@x.com>").unwrap();
        assert_eq!(mailer.sender(), "Forum <forum@x.com>");

        mailer
            .new_email(Some("Hi"), None)
            .send(&["b@x.com"], &[], &[])
            .unwrap();

        let sent = mailer.mock().unwrap().last().unwrap();
        assert_eq!(sent.from, "forum@x.com");
        assert_eq!(sent.headers.get("From"), Some("\"Forum\" <forum@x.com>"));
    }

    #[test]
    fn test_close_without_session_is_noop() {
        let mut mailer = mock_mailer();
        mailer.close();
        assert!(matches!(mailer.transport(), MailTransport::Mock(_)));
    }
}
