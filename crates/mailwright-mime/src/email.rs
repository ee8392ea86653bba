//! Fluent builder for outgoing messages.

use crate::attachment::{ATTACHMENT_LIMIT, Attachment};
use crate::content_type::ContentType;
use crate::encoding::{decode_address, encode_header_word, format_mailbox, prepare_body};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::multipart;
use crate::transport::{OutgoingMessage, Transport};
use chrono::Utc;
use std::path::Path;

/// Value of the `X-Mailer` header.
pub const MAILER_TAG: &str = concat!("mailwright ", env!("CARGO_PKG_VERSION"));

/// An email under construction, bound to the transport that will send it.
///
/// Setters consume and return the builder so calls can be chained. The
/// message is composed and handed to the transport by [`Email::send`],
/// which consumes the builder.
///
/// Attachments are admitted eagerly (existence, type and the cumulative
/// 10 MiB cap are checked by [`Email::attach`]) but read lazily. A file that
/// disappears between admission and sending is left out of the message with
/// a warning rather than failing the send.
#[derive(Debug)]
pub struct Email<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    from_name: Option<String>,
    from_address: String,
    body: String,
    headers: Headers,
    attachments: Vec<Attachment>,
    attachment_size: u64,
}

impl<'t, T: Transport + ?Sized> Email<'t, T> {
    /// Creates an empty message from `from` (`addr` or `Name <addr>`).
    pub fn new(from: &str, transport: &'t mut T) -> Self {
        let (from_name, from_address) = decode_address(from);

        let mut headers = Headers::new();
        headers.set("MIME-Version", "1.0");
        headers.set("Content-Transfer-Encoding", "8bit");
        headers.set("Content-Type", ContentType::text_plain().to_string());
        headers.set("X-Mailer", MAILER_TAG);

        Self {
            transport,
            from_name,
            from_address,
            body: String::new(),
            headers,
            attachments: Vec::new(),
            attachment_size: 0,
        }
    }

    /// Sets the Reply-To address (`addr` or `Name <addr>`).
    #[must_use]
    pub fn reply_to(mut self, reply_to: &str) -> Self {
        let (name, address) = decode_address(reply_to);
        self.headers
            .set("Reply-To", format_mailbox(name.as_deref(), &address));
        self
    }

    /// Sets the subject, encoding it if it is not plain ASCII.
    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.headers.set("Subject", encode_header_word(subject));
        self
    }

    /// Replaces the body text.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends to the body text.
    #[must_use]
    pub fn append_body(mut self, text: &str) -> Self {
        self.body.push_str(text);
        self
    }

    /// Sets a custom header. The value is sanitized when the message is
    /// composed.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Attaches a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is a directory, cannot be read, or would
    /// push the total attachment size over 10 MiB.
    pub fn attach(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let attachment = Attachment::from_path(path)?;

        let total = self.attachment_size + attachment.size();
        if total > ATTACHMENT_LIMIT {
            return Err(Error::AttachmentLimitExceeded {
                total,
                limit: ATTACHMENT_LIMIT,
            });
        }

        self.attachment_size = total;
        self.attachments.push(attachment);
        Ok(self)
    }

    /// Returns the sender address without display name.
    #[must_use]
    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    /// Returns the admitted attachments.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Returns the cumulative size of the admitted attachments.
    #[must_use]
    pub const fn attachment_size(&self) -> u64 {
        self.attachment_size
    }

    /// Builds the wire body, header set and envelope for the given
    /// recipients without sending anything.
    #[must_use]
    pub fn compose(&self, to: &[&str], cc: &[&str], bcc: &[&str]) -> OutgoingMessage {
        let plain = |list: &[&str]| -> Vec<String> {
            list.iter().map(|addr| decode_address(addr).1).collect()
        };
        let (to, cc, bcc) = (plain(to), plain(cc), plain(bcc));

        let mut headers = self.headers.clone();
        headers.set("Date", Utc::now().to_rfc2822());

        let message = multipart::assemble(&mut headers, &prepare_body(&self.body), &self.attachments);

        headers.set(
            "From",
            format_mailbox(self.from_name.as_deref(), &self.from_address),
        );
        for (name, list) in [("To", &to), ("Cc", &cc), ("Bcc", &bcc)] {
            if !list.is_empty() {
                headers.set(name, list.join(", "));
            }
        }
        headers.sanitize();

        OutgoingMessage {
            from: self.from_address.clone(),
            recipients: to.into_iter().chain(cc).chain(bcc).collect(),
            message,
            headers,
        }
    }

    /// Composes the message and hands it to the transport.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if delivery fails.
    pub fn send(self, to: &[&str], cc: &[&str], bcc: &[&str]) -> std::result::Result<(), T::Error> {
        let outgoing = self.compose(to, cc, bcc);
        tracing::debug!(
            from = %outgoing.from,
            recipients = outgoing.recipients.len(),
            attachments = self.attachments.len(),
            "Sending composed message"
        );
        self.transport.send(
            &outgoing.from,
            &outgoing.recipients,
            &outgoing.message,
            &outgoing.headers,
        )
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
    use crate::transport::MockTransport;
    use std::fs::File;

    fn header_names(headers: &Headers) -> Vec<&str> {
        headers.iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_compose_plain_message() {
        let mut transport = MockTransport::new();
        let email = Email::new("a@x.com", &mut transport)
            .subject("héllo")
            .body("Hi.\n.\n");
        let out = email.compose(&["b@x.com"], &[], &[]);

        assert_eq!(out.from, "a@x.com");
        assert_eq!(out.recipients, vec!["b@x.com"]);
        assert_eq!(out.message, "Hi.\r\n..\r\n");
        assert_eq!(out.headers.get("Subject"), Some("=?UTF-8?B?aMOpbGxv?="));
        assert_eq!(out.headers.get("From"), Some("a@x.com"));
        assert_eq!(out.headers.get("To"), Some("b@x.com"));
        assert!(!out.headers.contains("Cc"));
        assert!(!out.headers.contains("Bcc"));
    }

    #[test]
    fn test_header_order() {
        let mut transport = MockTransport::new();
        let email = Email::new("Ann <a@x.com>", &mut transport)
            .reply_to("r@x.com")
            .subject("s")
            .header("X-Custom", "1");
        let out = email.compose(&["b@x.com"], &["c@x.com"], &["d@x.com"]);

        assert_eq!(
            header_names(&out.headers),
            vec![
                "MIME-Version",
                "Content-Transfer-Encoding",
                "Content-Type",
                "X-Mailer",
                "Reply-To",
                "Subject",
                "X-Custom",
                "Date",
                "From",
                "To",
                "Cc",
                "Bcc",
            ]
        );
        assert_eq!(out.headers.get("From"), Some("\"Ann\" <a@x.com>"));
        assert_eq!(out.headers.get("X-Mailer"), Some(MAILER_TAG));
        assert_eq!(
            out.headers.get("Content-Type"),
            Some("text/plain; charset=\"utf-8\"")
        );
    }

    #[test]
    fn test_envelope_contains_all_recipients() {
        let mut transport = MockTransport::new();
        let email = Email::new("a@x.com", &mut transport);
        let out = email.compose(
            &["b@x.com", "Carl <c@x.com>"],
            &["d@x.com"],
            &["hidden@x.com"],
        );

        assert_eq!(
            out.recipients,
            vec!["b@x.com", "c@x.com", "d@x.com", "hidden@x.com"]
        );
        assert_eq!(out.headers.get("To"), Some("b@x.com, c@x.com"));
        assert_eq!(out.headers.get("Bcc"), Some("hidden@x.com"));
    }

    #[test]
    fn test_reply_to_with_name() {
        let mut transport = MockTransport::new();
        let out = Email::new("a@x.com", &mut transport)
            .reply_to("Jörg <j@x.com>")
            .compose(&["b@x.com"], &[], &[]);
        assert_eq!(
            out.headers.get("Reply-To"),
            Some("\"=?UTF-8?B?SsO2cmc=?=\" <j@x.com>")
        );
    }

    #[test]
    fn test_custom_header_value_is_sanitized() {
        let mut transport = MockTransport::new();
        let out = Email::new("a@x.com", &mut transport)
            .header("X-Note", "one\r\nBcc: evil@x.com")
            .compose(&["b@x.com"], &[], &[]);
        assert_eq!(out.headers.get("X-Note"), Some("oneBcc: evil@x.com"));
    }

    #[test]
    fn test_append_body() {
        let mut transport = MockTransport::new();
        let out = Email::new("a@x.com", &mut transport)
            .body("line one\n")
            .append_body("line two")
            .compose(&["b@x.com"], &[], &[]);
        assert_eq!(out.message, "line one\r\nline two");
    }

    #[test]
    fn test_send_hands_message_to_transport() {
        let mut transport = MockTransport::new();
        Email::new("a@x.com", &mut transport)
            .subject("Hello")
            .body("Body")
            .send(&["b@x.com"], &[], &["c@x.com"])
            .unwrap();

        let sent = transport.last().unwrap();
        assert_eq!(sent.from, "a@x.com");
        assert_eq!(sent.recipients, vec!["b@x.com", "c@x.com"]);
        assert_eq!(sent.message, "Body");
        assert_eq!(sent.headers.get("Subject"), Some("Hello"));
    }

    #[test]
    fn test_attachment_limit_exact_fits() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.bin");
        let small = dir.path().join("small.bin");
        File::create(&big).unwrap().set_len(ATTACHMENT_LIMIT - 1).unwrap();
        File::create(&small).unwrap().set_len(1).unwrap();

        let mut transport = MockTransport::new();
        let email = Email::new("a@x.com", &mut transport)
            .attach(&big)
            .unwrap()
            .attach(&small)
            .unwrap();
        assert_eq!(email.attachment_size(), 10_485_760);
        assert_eq!(email.attachments().len(), 2);
    }

    #[test]
    fn test_attachment_limit_one_over_fails() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.bin");
        let small = dir.path().join("small.bin");
        File::create(&big).unwrap().set_len(ATTACHMENT_LIMIT - 1).unwrap();
        File::create(&small).unwrap().set_len(2).unwrap();

        let mut transport = MockTransport::new();
        let err = Email::new("a@x.com", &mut transport)
            .attach(&big)
            .unwrap()
            .attach(&small)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::AttachmentLimitExceeded {
                total: 10_485_761,
                limit: ATTACHMENT_LIMIT
            }
        ));
    }

    #[test]
    fn test_compose_with_attachment_switches_to_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "attached").unwrap();

        let mut transport = MockTransport::new();
        let out = Email::new("a@x.com", &mut transport)
            .body("See attachment")
            .attach(&path)
            .unwrap()
            .compose(&["b@x.com"], &[], &[]);

        let ct = out.headers.get("Content-Type").unwrap();
        assert!(ct.starts_with("multipart/mixed; boundary=\""));
        assert_eq!(out.headers.get("Content-Disposition"), Some("inline"));
        assert!(!out.headers.contains("Content-Transfer-Encoding"));
        assert!(out.message.contains("See attachment\r\n"));
        assert!(out.message.contains("filename=\"note.txt\""));

        let names = header_names(&out.headers);
        let from_pos = names.iter().position(|n| *n == "From").unwrap();
        let ct_pos = names.iter().position(|n| *n == "Content-Type").unwrap();
        assert!(ct_pos < from_pos);
    }
}
