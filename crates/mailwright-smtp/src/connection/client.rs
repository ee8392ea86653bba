//! SMTP session driver.

use super::{Connection, SmtpConfig};
use crate::auth::{self, AuthMechanism};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode, ServerExtensions};
use mailwright_mime::{Headers, Transport};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket open, greeting not yet read.
    Connecting,
    /// Server sent 220.
    Greeted,
    /// EHLO or HELO accepted.
    Negotiated,
    /// STARTTLS completed, renegotiation pending.
    TlsUpgraded,
    /// Credentials accepted.
    Authenticated,
    /// Ready for the first message.
    Ready,
    /// A mail transaction is in progress.
    InTransaction,
    /// Last message delivered, ready for the next one.
    Idle,
    /// QUIT sent and socket closed.
    Closed,
}

impl SessionState {
    /// Returns true if a new transaction may start.
    #[must_use]
    pub const fn accepts_mail(self) -> bool {
        matches!(self, Self::Ready | Self::Idle)
    }
}

/// An established SMTP session that delivers messages.
///
/// [`SmtpTransport::connect`] runs the whole handshake: greeting, EHLO (with
/// HELO fallback), opportunistic STARTTLS and authentication. Each
/// [`Transport::send`] then runs one MAIL/RCPT/DATA transaction.
///
/// The session owns its connection. [`SmtpTransport::close`] sends QUIT and
/// closes the socket; dropping the transport does the same, so a session
/// that fails half-way through the handshake is still torn down.
///
/// # Example
///
/// ```ignore
/// use mailwright_smtp::{SmtpConfig, SmtpTransport};
/// use mailwright_mime::Email;
///
/// let config = SmtpConfig::builder("smtp.example.com")
///     .port(587)
///     .credentials("user", "secret")
///     .build();
/// let mut smtp = SmtpTransport::connect(&config)?;
///
/// Email::new("me@example.com", &mut smtp)
///     .subject("Hello")
///     .body("Hi there")
///     .send(&["you@example.com"], &[], &[])?;
///
/// smtp.close();
/// ```
#[derive(Debug)]
pub struct SmtpTransport {
    connection: Connection,
    extensions: ServerExtensions,
    local_hostname: String,
    state: SessionState,
    mechanism: Option<AuthMechanism>,
}

impl SmtpTransport {
    /// Connects to the configured server and completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails, the server rejects any
    /// handshake step, or authentication fails. The connection is closed
    /// before returning.
    pub fn connect(config: &SmtpConfig) -> Result<Self> {
        let connection = Connection::connect(
            &config.host,
            config.port,
            config.security.is_implicit(),
            config.timeout,
            config.tls.clone(),
        )?
        .with_max_buffer(config.max_buffer);

        let mut transport = Self {
            connection,
            extensions: ServerExtensions::default(),
            local_hostname: config.local_hostname.clone(),
            state: SessionState::Connecting,
            mechanism: None,
        };
        transport.handshake(config)?;
        Ok(transport)
    }

    fn handshake(&mut self, config: &SmtpConfig) -> Result<()> {
        let greeting = self.connection.read_reply()?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::unexpected("greeting", greeting.code, greeting.message_text()));
        }
        self.transition(SessionState::Greeted);

        self.negotiate()?;

        if config.security.wants_starttls()
            && self.extensions.supports_starttls()
            && !self.connection.is_secure()
        {
            self.starttls()?;
        }

        if let Some(size) = self.extensions.max_size() {
            self.connection.set_max_buffer(size);
        }

        if let Some(credentials) = &config.credentials {
            let mechanism = auth::authenticate(
                &mut self.connection,
                self.extensions.auth_mechanisms(),
                credentials,
            )?;
            self.mechanism = Some(mechanism);
            self.transition(SessionState::Authenticated);
        }

        self.transition(SessionState::Ready);
        tracing::info!(
            host = %self.connection.host(),
            port = self.connection.port(),
            tls = self.connection.is_secure(),
            mechanism = self.mechanism.map(AuthMechanism::as_str),
            "SMTP session established"
        );
        Ok(())
    }

    /// Sends EHLO, falling back to HELO, and records the extensions.
    fn negotiate(&mut self) -> Result<()> {
        let hostname = self.local_hostname.clone();
        let mut reply = self.command(&Command::Ehlo {
            hostname: hostname.clone(),
        })?;

        if reply.code != ReplyCode::OK {
            tracing::debug!(code = %reply.code, "EHLO rejected, trying HELO");
            reply = self.command(&Command::Helo { hostname })?;
            if reply.code != ReplyCode::OK {
                return Err(Error::unexpected("HELO", reply.code, reply.message_text()));
            }
        }

        self.extensions = ServerExtensions::from_ehlo(&reply.message);
        tracing::debug!(
            extensions = ?self.extensions.verbs().collect::<Vec<_>>(),
            "Negotiated"
        );
        self.transition(SessionState::Negotiated);
        Ok(())
    }

    fn starttls(&mut self) -> Result<()> {
        let reply = self.command(&Command::StartTls)?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(Error::unexpected("STARTTLS", reply.code, reply.message_text()));
        }

        self.connection.enable_crypto()?;
        self.transition(SessionState::TlsUpgraded);
        self.negotiate()
    }

    fn command(&mut self, command: &Command) -> Result<Reply> {
        self.connection.write(&command.to_string())?;
        self.connection.read_reply()
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }

    fn transaction(
        &mut self,
        from: &str,
        recipients: &[String],
        message: &str,
        headers: &Headers,
    ) -> Result<()> {
        let reply = self.command(&Command::MailFrom {
            from: from.to_string(),
        })?;
        if reply.code != ReplyCode::OK {
            return Err(Error::unexpected("MAIL FROM", reply.code, reply.message_text()));
        }

        for recipient in recipients {
            let reply = self.command(&Command::RcptTo {
                to: recipient.clone(),
            })?;
            if reply.code != ReplyCode::OK && reply.code != ReplyCode::FORWARD {
                return Err(Error::unexpected("RCPT TO", reply.code, reply.message_text()));
            }
        }

        let mut headers = headers.clone();
        headers.remove("Bcc");
        let payload = build_payload(&headers, message);

        let size = payload.len() + 2;
        if size > self.connection.max_buffer() {
            return Err(Error::SizeLimitExceeded {
                size,
                limit: self.connection.max_buffer(),
            });
        }

        let reply = self.command(&Command::Data)?;
        if reply.code != ReplyCode::START_DATA {
            return Err(Error::unexpected("DATA", reply.code, reply.message_text()));
        }

        self.connection.write(&payload)?;
        let reply = self.connection.read_reply()?;
        if reply.code != ReplyCode::OK {
            return Err(Error::unexpected("end of data", reply.code, reply.message_text()));
        }

        Ok(())
    }

    /// Sends RSET after a failed transaction so the session can carry the
    /// next message. Closes the session if the server does not accept it.
    fn recover(&mut self) {
        if self.connection.is_closed() {
            self.transition(SessionState::Closed);
            return;
        }

        match self.command(&Command::Rset) {
            Ok(reply) if reply.code == ReplyCode::OK => self.transition(SessionState::Ready),
            Ok(reply) => {
                tracing::warn!(code = %reply.code, "RSET rejected, closing session");
                self.close();
            }
            Err(e) => {
                tracing::warn!(error = %e, "RSET failed, closing session");
                self.close();
            }
        }
    }

    /// Sends QUIT and closes the connection. Errors are logged and ignored.
    ///
    /// Calling it again has no effect.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed && self.connection.is_closed() {
            return;
        }

        if !self.connection.is_closed()
            && let Err(e) = self.connection.write(&Command::Quit.to_string())
        {
            tracing::warn!(error = %e, "QUIT failed during teardown");
        }
        self.connection.close();
        self.transition(SessionState::Closed);
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the extensions from the last negotiation.
    #[must_use]
    pub const fn extensions(&self) -> &ServerExtensions {
        &self.extensions
    }

    /// Returns the mechanism used to authenticate, if any.
    #[must_use]
    pub const fn mechanism(&self) -> Option<AuthMechanism> {
        self.mechanism
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl Transport for SmtpTransport {
    type Error = Error;

    fn send(
        &mut self,
        from: &str,
        recipients: &[String],
        message: &str,
        headers: &Headers,
    ) -> Result<()> {
        if !self.state.accepts_mail() {
            return Err(Error::Closed);
        }

        self.transition(SessionState::InTransaction);
        match self.transaction(from, recipients, message, headers) {
            Ok(()) => {
                self.transition(SessionState::Idle);
                tracing::info!(from, recipients = recipients.len(), "Message accepted");
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Transaction failed");
                self.recover();
                Err(e)
            }
        }
    }
}

impl Drop for SmtpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Serializes headers, blank line, body and the lone `.` terminator.
///
/// The body must already be dot-stuffed. A CRLF is inserted before the
/// terminator unless the body already ends with one.
#[must_use]
pub fn build_payload(headers: &Headers, message: &str) -> String {
    let mut data = headers.to_wire();
    data.push_str("\r\n");
    data.push_str(message);
    if !data.ends_with("\r\n") {
        data.push_str("\r\n");
    }
    data.push('.');
    data
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

    fn headers() -> Headers {
        [("Subject", "Hi"), ("To", "b@x.com")].into_iter().collect()
    }

    #[test]
    fn test_payload_appends_terminator() {
        assert_eq!(
            build_payload(&headers(), "Body"),
            "Subject: Hi\r\nTo: b@x.com\r\n\r\nBody\r\n."
        );
    }

    #[test]
    fn test_payload_keeps_trailing_crlf() {
        assert_eq!(
            build_payload(&headers(), "Hi.\r\n..\r\n"),
            "Subject: Hi\r\nTo: b@x.com\r\n\r\nHi.\r\n..\r\n."
        );
    }

    #[test]
    fn test_payload_empty_body() {
        assert_eq!(
            build_payload(&headers(), ""),
            "Subject: Hi\r\nTo: b@x.com\r\n\r\n."
        );
    }

    #[test]
    fn test_accepts_mail() {
        assert!(SessionState::Ready.accepts_mail());
        assert!(SessionState::Idle.accepts_mail());
        assert!(!SessionState::InTransaction.accepts_mail());
        assert!(!SessionState::Closed.accepts_mail());
    }
}
