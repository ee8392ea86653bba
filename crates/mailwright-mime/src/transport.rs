//! The delivery contract shared by all transports.

use crate::header::Headers;
use std::convert::Infallible;

/// Something that can deliver a composed message.
///
/// `message` is the wire-ready body (CRLF line endings, dot-stuffed) and
/// `headers` the final header set. `recipients` is the full envelope,
/// including blind copies that do not appear in `headers`.
pub trait Transport {
    /// Error returned when delivery fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered to every
    /// recipient.
    fn send(
        &mut self,
        from: &str,
        recipients: &[String],
        message: &str,
        headers: &Headers,
    ) -> Result<(), Self::Error>;
}

/// A composed message as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Envelope sender.
    pub from: String,
    /// Envelope recipients (To, Cc and Bcc).
    pub recipients: Vec<String>,
    /// Wire-ready body.
    pub message: String,
    /// Final header set.
    pub headers: Headers,
}

/// Transport that records messages instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Vec<OutgoingMessage>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message sent so far.
    #[must_use]
    pub fn sent(&self) -> &[OutgoingMessage] {
        &self.sent
    }

    /// Returns the most recently sent message.
    #[must_use]
    pub fn last(&self) -> Option<&OutgoingMessage> {
        self.sent.last()
    }

    /// Drains and returns the recorded messages.
    pub fn take(&mut self) -> Vec<OutgoingMessage> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MockTransport {
    type Error = Infallible;

    fn send(
        &mut self,
        from: &str,
        recipients: &[String],
        message: &str,
        headers: &Headers,
    ) -> Result<(), Self::Error> {
        tracing::debug!(from, recipients = recipients.len(), "Recording message");
        self.sent.push(OutgoingMessage {
            from: from.to_string(),
            recipients: recipients.to_vec(),
            message: message.to_string(),
            headers: headers.clone(),
        });
        Ok(())
    }
}
