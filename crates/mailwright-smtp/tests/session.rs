//! Session tests against a scripted loopback server.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::{FakeServer, basic, ehlo_reply, respond_basic};
use mailwright_mime::{Email, Headers, Transport};
use mailwright_smtp::{AuthMechanism, Error, ReplyCode, Security, SessionState, SmtpTransport};

#[test]
fn test_end_to_end_plain_message() {
    let server = FakeServer::start(basic(&["PIPELINING", "8BITMIME"]));
    let mut smtp = SmtpTransport::connect(&server.config().build()).unwrap();
    assert_eq!(smtp.state(), SessionState::Ready);
    assert_eq!(smtp.mechanism(), None);

    Email::new("a@x.com", &mut smtp)
        .subject("héllo")
        .body("Hi.\n.\n")
        .send(&["b@x.com"], &[], &[])
        .unwrap();
    assert_eq!(smtp.state(), SessionState::Idle);
    smtp.close();

    let transcript = server.finish();
    assert_eq!(
        transcript.commands,
        vec![
            "EHLO client.test",
            "MAIL FROM:<a@x.com>",
            "RCPT TO:<b@x.com>",
            "DATA",
            "QUIT"
        ]
    );
    assert_eq!(transcript.count("RCPT TO:<b@x.com>"), 1);

    let message = &transcript.messages[0];
    assert!(message.contains("Subject: =?UTF-8?B?aMOpbGxv?=\r\n"));
    assert!(message.contains("From: a@x.com\r\nTo: b@x.com\r\n\r\n"));
    assert!(message.ends_with("\r\n\r\nHi.\r\n.."));
}

#[test]
fn test_bcc_only_in_envelope() {
    let server = FakeServer::start(basic(&[]));
    let mut smtp = SmtpTransport::connect(&server.config().build()).unwrap();

    Email::new("a@x.com", &mut smtp)
        .body("secret copy")
        .send(&["b@x.com"], &["c@x.com"], &["hidden@x.com"])
        .unwrap();
    drop(smtp);

    let transcript = server.finish();
    assert!(transcript.saw("RCPT TO:<b@x.com>"));
    assert!(transcript.saw("RCPT TO:<c@x.com>"));
    assert!(transcript.saw("RCPT TO:<hidden@x.com>"));

    let message = &transcript.messages[0];
    assert!(message.contains("Cc: c@x.com\r\n"));
    assert!(!message.contains("Bcc"));
    assert!(!message.contains("hidden@x.com"));
}

#[test]
fn test_no_starttls_when_not_advertised() {
    let server = FakeServer::start(basic(&["SIZE 1000000"]));
    let smtp = SmtpTransport::connect(&server.config().build()).unwrap();
    assert!(!smtp.connection().is_secure());
    drop(smtp);

    let transcript = server.finish();
    assert!(!transcript.saw("STARTTLS"));
    assert_eq!(transcript.count("EHLO client.test"), 1);
}

#[test]
fn test_no_starttls_when_disabled() {
    let server = FakeServer::start(basic(&["STARTTLS"]));
    let config = server.config().security(Security::None).build();
    let smtp = SmtpTransport::connect(&config).unwrap();
    drop(smtp);

    assert!(!server.finish().saw("STARTTLS"));
}

#[test]
fn test_starttls_rejected_is_fatal() {
    let server = FakeServer::start(|line: &str| match line {
        "STARTTLS" => "454 TLS not available".to_string(),
        _ => respond_basic(line, &["STARTTLS"]),
    });

    let err = SmtpTransport::connect(&server.config().build()).unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedReply {
            step: "STARTTLS",
            ..
        }
    ));
    assert!(err.is_transient());

    let transcript = server.finish();
    assert_eq!(transcript.commands.last().unwrap(), "QUIT");
}

#[test]
fn test_ehlo_falls_back_to_helo() {
    let server = FakeServer::start(|line: &str| {
        if line.starts_with("EHLO ") {
            "502 Command not implemented".to_string()
        } else if line.starts_with("HELO ") {
            "250 fake.example.com".to_string()
        } else {
            respond_basic(line, &[])
        }
    });
    let smtp = SmtpTransport::connect(&server.config().build()).unwrap();
    assert!(smtp.extensions().is_empty());
    drop(smtp);

    let transcript = server.finish();
    assert_eq!(
        transcript.commands,
        vec!["EHLO client.test", "HELO client.test", "QUIT"]
    );
}

#[test]
fn test_helo_rejected_is_fatal() {
    let server = FakeServer::start(|line: &str| {
        if line.starts_with("EHLO ") || line.starts_with("HELO ") {
            "550 go away".to_string()
        } else {
            respond_basic(line, &[])
        }
    });

    let err = SmtpTransport::connect(&server.config().build()).unwrap_err();
    assert_eq!(err.reply_code(), Some(ReplyCode::MAILBOX_UNAVAILABLE));
    server.finish();
}

#[test]
fn test_bad_greeting_is_fatal() {
    let server = FakeServer::with_greeting("554 No SMTP service here", basic(&[]));

    let err = SmtpTransport::connect(&server.config().build()).unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedReply {
            step: "greeting",
            code,
            ..
        } if code.as_i16() == 554
    ));

    let transcript = server.finish();
    assert_eq!(transcript.commands, vec!["QUIT"]);
}

#[test]
fn test_login_preferred_over_plain() {
    let server = FakeServer::start(|line: &str| match line {
        "AUTH LOGIN" => "334 VXNlcm5hbWU6".to_string(),
        "dXNlcg==" => "334 UGFzc3dvcmQ6".to_string(),
        "cGFzcw==" => "235 Authentication succeeded".to_string(),
        _ => respond_basic(line, &["AUTH PLAIN LOGIN"]),
    });
    let config = server.config().credentials("user", "pass").build();
    let smtp = SmtpTransport::connect(&config).unwrap();
    assert_eq!(smtp.mechanism(), Some(AuthMechanism::Login));
    drop(smtp);

    let transcript = server.finish();
    assert!(transcript.saw("AUTH LOGIN"));
    assert!(!transcript.saw("AUTH PLAIN"));
}

#[test]
fn test_rejected_credentials_are_fatal() {
    let server = FakeServer::start(|line: &str| match line {
        "AUTH PLAIN" => "334 ".to_string(),
        "AHVzZXIAd3Jvbmc=" => "535 Authentication credentials invalid".to_string(),
        _ => respond_basic(line, &["AUTH PLAIN"]),
    });
    let config = server.config().credentials("user", "wrong").build();

    let err = SmtpTransport::connect(&config).unwrap_err();
    assert!(matches!(
        err,
        Error::AuthFailed {
            mechanism: "PLAIN",
            ..
        }
    ));
    assert!(err.is_permanent());
    server.finish();
}

#[test]
fn test_credentials_without_auth_extension() {
    let server = FakeServer::start(basic(&["PIPELINING"]));
    let config = server.config().credentials("user", "pass").build();

    let err = SmtpTransport::connect(&config).unwrap_err();
    assert!(matches!(err, Error::AuthUnsupported { .. }));
    server.finish();
}

#[test]
fn test_rcpt_failure_aborts_and_resets() {
    let server = FakeServer::start(|line: &str| match line {
        "RCPT TO:<nobody@x.com>" => "550 No such user".to_string(),
        _ => respond_basic(line, &[]),
    });
    let mut smtp = SmtpTransport::connect(&server.config().build()).unwrap();

    let err = Email::new("a@x.com", &mut smtp)
        .body("first")
        .send(&["b@x.com", "nobody@x.com"], &[], &[])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedReply {
            step: "RCPT TO",
            ..
        }
    ));
    assert_eq!(smtp.state(), SessionState::Ready);

    Email::new("a@x.com", &mut smtp)
        .body("second")
        .send(&["b@x.com"], &[], &[])
        .unwrap();
    smtp.close();

    let transcript = server.finish();
    assert_eq!(transcript.count("RSET"), 1);
    assert_eq!(transcript.count("DATA"), 1);
    assert_eq!(transcript.messages.len(), 1);
    assert!(transcript.messages[0].ends_with("second"));
}

#[test]
fn test_will_forward_is_accepted() {
    let server = FakeServer::start(|line: &str| match line {
        "RCPT TO:<far@y.com>" => "251 User not local; will forward".to_string(),
        _ => respond_basic(line, &[]),
    });
    let mut smtp = SmtpTransport::connect(&server.config().build()).unwrap();

    smtp.send(
        "a@x.com",
        &["far@y.com".to_string()],
        "Body",
        &Headers::new(),
    )
    .unwrap();
    smtp.close();

    assert_eq!(server.finish().messages, vec!["\r\nBody"]);
}

#[test]
fn test_data_rejected() {
    let server = FakeServer::start(|line: &str| match line {
        "." => "552 Message too big".to_string(),
        _ => respond_basic(line, &[]),
    });
    let mut smtp = SmtpTransport::connect(&server.config().build()).unwrap();

    let err = Email::new("a@x.com", &mut smtp)
        .body("Body")
        .send(&["b@x.com"], &[], &[])
        .unwrap_err();
    assert_eq!(err.reply_code(), Some(ReplyCode::EXCEEDED_STORAGE));
    smtp.close();
    server.finish();
}

#[test]
fn test_advertised_size_limits_payload() {
    let server = FakeServer::start(basic(&["SIZE 512"]));
    let mut smtp = SmtpTransport::connect(&server.config().build()).unwrap();
    assert_eq!(smtp.connection().max_buffer(), 512);

    let err = Email::new("a@x.com", &mut smtp)
        .body("x".repeat(600))
        .send(&["b@x.com"], &[], &[])
        .unwrap_err();
    assert!(matches!(err, Error::SizeLimitExceeded { limit: 512, .. }));
    smtp.close();

    let transcript = server.finish();
    assert!(!transcript.saw("DATA"));
    assert!(transcript.saw("RSET"));
}

#[test]
fn test_close_sends_quit_once() {
    let server = FakeServer::start(basic(&[]));
    let mut smtp = SmtpTransport::connect(&server.config().build()).unwrap();
    smtp.close();
    smtp.close();
    assert_eq!(smtp.state(), SessionState::Closed);

    let err = smtp
        .send("a@x.com", &["b@x.com".to_string()], "x", &Headers::new())
        .unwrap_err();
    assert!(matches!(err, Error::Closed));
    drop(smtp);

    assert_eq!(server.finish().count("QUIT"), 1);
}

#[test]
fn test_multiline_ehlo_is_parsed() {
    let server = FakeServer::start(|line: &str| {
        if line.starts_with("EHLO ") {
            ehlo_reply(&["auth login plain", "SIZE 35000000", "DSN"])
        } else {
            respond_basic(line, &[])
        }
    });
    let smtp = SmtpTransport::connect(&server.config().build()).unwrap();

    let extensions = smtp.extensions();
    assert_eq!(extensions.auth_mechanisms(), "login plain");
    assert_eq!(extensions.max_size(), Some(35_000_000));
    assert!(extensions.supports("DSN"));
    drop(smtp);
    server.finish();
}

#[test]
fn test_starttls_renegotiates_extensions() {
    let tls = common::self_signed();
    let secure = Arc::new(AtomicBool::new(false));
    let upgraded = Arc::clone(&secure);
    let server = FakeServer::starttls(tls.server, move |line: &str| match line {
        "STARTTLS" => {
            upgraded.store(true, Ordering::SeqCst);
            "220 Ready to start TLS".to_string()
        }
        "AUTH PLAIN" => "334 ".to_string(),
        "AHVzZXIAcGFzcw==" => "235 Authentication succeeded".to_string(),
        _ if upgraded.load(Ordering::SeqCst) => respond_basic(line, &["AUTH PLAIN", "SIZE 100000"]),
        _ => respond_basic(line, &["STARTTLS", "SIZE 1000"]),
    });
    let config = server
        .secure_config(tls.client)
        .credentials("user", "pass")
        .build();

    let mut smtp = SmtpTransport::connect(&config).unwrap();
    assert!(smtp.connection().is_secure());
    assert_eq!(smtp.mechanism(), Some(AuthMechanism::Plain));
    assert!(!smtp.extensions().supports_starttls());
    assert_eq!(smtp.extensions().auth_mechanisms(), "PLAIN");
    assert_eq!(smtp.extensions().max_size(), Some(100_000));

    Email::new("a@x.com", &mut smtp)
        .body("over tls")
        .send(&["b@x.com"], &[], &[])
        .unwrap();
    smtp.close();

    assert!(secure.load(Ordering::SeqCst));
    let transcript = server.finish();
    assert_eq!(
        transcript.commands[..5],
        [
            "EHLO client.test",
            "STARTTLS",
            "EHLO client.test",
            "AUTH PLAIN",
            "AHVzZXIAcGFzcw=="
        ]
    );
    assert_eq!(transcript.count("EHLO client.test"), 2);
    assert!(transcript.messages[0].ends_with("over tls"));
}

#[test]
fn test_implicit_tls_session() {
    let tls = common::self_signed();
    let server = FakeServer::implicit_tls(tls.server, basic(&["STARTTLS"]));
    let config = server
        .secure_config(tls.client)
        .security(Security::Implicit)
        .build();

    let smtp = SmtpTransport::connect(&config).unwrap();
    assert!(smtp.connection().is_secure());
    drop(smtp);

    let transcript = server.finish();
    assert_eq!(transcript.commands, vec!["EHLO client.test", "QUIT"]);
}

#[test]
fn test_untrusted_certificate_is_fatal() {
    let tls = common::self_signed();
    let server = FakeServer::starttls(tls.server, basic(&["STARTTLS"]));
    let config = server
        .config_for_host("localhost")
        .security(Security::StartTls)
        .build();

    let err = SmtpTransport::connect(&config).unwrap_err();
    assert!(matches!(err, Error::Handshake { .. }));

    let transcript = server.finish();
    assert_eq!(transcript.commands, vec!["EHLO client.test", "STARTTLS"]);
}

#[test]
fn test_raised_buffer_carries_large_message() {
    let server = FakeServer::start(basic(&["SIZE 35000000"]));
    let config = server.config().max_buffer(1024 * 1024).build();
    let mut smtp = SmtpTransport::connect(&config).unwrap();
    assert_eq!(smtp.connection().max_buffer(), 1024 * 1024);

    let body = "lorem ipsum dolor sit amet\n".repeat(4000);
    Email::new("a@x.com", &mut smtp)
        .body(body)
        .send(&["b@x.com"], &[], &[])
        .unwrap();
    smtp.close();

    let transcript = server.finish();
    assert!(transcript.messages[0].len() > 100_000);
}

#[test]
fn test_default_buffer_rejects_large_message() {
    let server = FakeServer::start(basic(&["SIZE 35000000"]));
    let mut smtp = SmtpTransport::connect(&server.config().build()).unwrap();

    let err = Email::new("a@x.com", &mut smtp)
        .body("lorem ipsum dolor sit amet\n".repeat(4000))
        .send(&["b@x.com"], &[], &[])
        .unwrap_err();
    assert!(matches!(err, Error::SizeLimitExceeded { limit: 65536, .. }));
    smtp.close();
    assert!(!server.finish().saw("DATA"));
}
