//! End-to-end composition tests.
//!
//! These tests build complete messages through the public API and inspect
//! what a transport would receive.

use std::fs;

use mailwright_mime::{ATTACHMENT_LIMIT, Email, Error, MockTransport};

#[test]
fn test_plain_message_reaches_transport() {
    let mut transport = MockTransport::new();

    Email::new("Ann <a@x.com>", &mut transport)
        .subject("Hello")
        .reply_to("Support <help@x.com>")
        .body("Hi.\n.\nBye")
        .send(&["b@x.com"], &["c@x.com"], &["d@x.com"])
        .unwrap();

    let sent = transport.last().unwrap();
    assert_eq!(sent.from, "a@x.com");
    assert_eq!(sent.recipients, ["b@x.com", "c@x.com", "d@x.com"]);
    assert_eq!(sent.message, "Hi.\r\n..\r\nBye");

    let wire = sent.headers.to_wire();
    assert!(wire.starts_with("MIME-Version: 1.0\r\n"));
    assert!(wire.contains("From: \"Ann\" <a@x.com>\r\n"));
    assert!(wire.contains("Reply-To: \"Support\" <help@x.com>\r\n"));
    assert!(wire.contains("Cc: c@x.com\r\n"));
    assert!(wire.contains("Bcc: d@x.com\r\n"));
    assert!(wire.contains("Date: "));
}

#[test]
fn test_long_lines_are_wrapped() {
    let mut transport = MockTransport::new();
    let body = "word ".repeat(40);

    Email::new("a@x.com", &mut transport)
        .body(body)
        .send(&["b@x.com"], &[], &[])
        .unwrap();

    let sent = transport.last().unwrap();
    assert!(sent.message.split("\r\n").all(|line| line.len() <= 72));
}

#[test]
fn test_message_with_attachments() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("notes.txt");
    let pdf = dir.path().join("scan.pdf");
    fs::write(&text, "some notes").unwrap();
    fs::write(&pdf, b"%PDF-1.4 fake").unwrap();

    let mut transport = MockTransport::new();
    Email::new("a@x.com", &mut transport)
        .subject("Files")
        .body("Two files attached.")
        .attach(&text)
        .unwrap()
        .attach(&pdf)
        .unwrap()
        .send(&["b@x.com"], &[], &[])
        .unwrap();

    let sent = transport.last().unwrap();
    let content_type = sent.headers.get("Content-Type").unwrap();
    let boundary = content_type
        .strip_prefix("multipart/mixed; boundary=\"")
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap();

    assert_eq!(sent.message.matches(&format!("--{boundary}\r\n")).count(), 3);
    assert!(sent.message.ends_with(&format!("--{boundary}--")));
    assert!(sent.message.contains("Content-Type: application/pdf\r\n"));
    assert!(sent.message.contains("filename=\"scan.pdf\""));
    assert!(sent.message.contains("filename=\"notes.txt\""));
    assert_eq!(sent.headers.get("Content-Disposition"), Some("inline"));
}

#[test]
fn test_directory_attachment_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = MockTransport::new();

    let err = Email::new("a@x.com", &mut transport)
        .attach(dir.path())
        .unwrap_err();
    assert!(matches!(err, Error::AttachmentIsDirectory { .. }));
}

#[test]
fn test_oversized_attachment_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.bin");
    fs::File::create(&path)
        .unwrap()
        .set_len(ATTACHMENT_LIMIT + 1)
        .unwrap();

    let mut transport = MockTransport::new();
    let err = Email::new("a@x.com", &mut transport)
        .attach(&path)
        .unwrap_err();
    assert!(matches!(err, Error::AttachmentLimitExceeded { .. }));
    assert!(transport.sent().is_empty());
}
