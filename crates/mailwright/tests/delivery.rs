//! Mailer delivery over a loopback SMTP server.

#![allow(clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use mailwright::{Error, Mailer, Security, SmtpConfig, TransportConfig};

/// Accepts one session, answers everything positively and returns the
/// command lines it saw.
fn spawn_server() -> (u16, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        let mut writer = socket.try_clone().unwrap();
        let mut reader = BufReader::new(socket);
        let mut seen = Vec::new();
        let mut in_data = false;

        writer.write_all(b"220 fake.example.com ESMTP\r\n").unwrap();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            if in_data {
                if line == "." {
                    in_data = false;
                    writer.write_all(b"250 Queued\r\n").unwrap();
                }
                continue;
            }
            let reply: &[u8] = if line.starts_with("EHLO") {
                b"250-fake.example.com\r\n250 8BITMIME\r\n"
            } else if line == "DATA" {
                in_data = true;
                b"354 Go ahead\r\n"
            } else if line == "QUIT" {
                seen.push(line);
                let _ = writer.write_all(b"221 Bye\r\n");
                break;
            } else {
                b"250 OK\r\n"
            };
            seen.push(line);
            writer.write_all(reply).unwrap();
        }
        seen
    });

    (port, handle)
}

fn config(port: u16) -> SmtpConfig {
    SmtpConfig::builder("127.0.0.1")
        .port(port)
        .security(Security::None)
        .local_hostname("client.test")
        .timeout(Duration::from_secs(5))
        .build()
}

#[test]
fn test_smtp_mailer_delivers() {
    let (port, server) = spawn_server();
    let mut mailer =
        Mailer::load(&TransportConfig::Smtp(config(port)), "Forum <forum@x.com>").unwrap();

    mailer
        .new_email(Some("Welcome"), Some("Hello there."))
        .send(&["member@x.com"], &[], &["admin@x.com"])
        .unwrap();
    mailer.close();

    let seen = server.join().unwrap();
    assert_eq!(
        seen,
        vec![
            "EHLO client.test",
            "MAIL FROM:<forum@x.com>",
            "RCPT TO:<member@x.com>",
            "RCPT TO:<admin@x.com>",
            "DATA",
            "QUIT",
        ]
    );
}

#[test]
fn test_load_fails_without_server() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = Mailer::load(&TransportConfig::Smtp(config(port)), "forum@x.com").unwrap_err();
    assert!(matches!(err, Error::Smtp(_)));
    assert!(!err.is_transient());
}

#[test]
fn test_missing_attachment_surfaces_as_mime_error() {
    let mut mailer = Mailer::load(&TransportConfig::Mock, "forum@x.com").unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = mailer
        .new_email(Some("Report"), None)
        .attach(dir.path())
        .map_err(Error::from)
        .unwrap_err();
    assert!(matches!(err, Error::Mime(_)));
    assert!(mailer.mock().unwrap().sent().is_empty());
}
