//! Line-oriented SMTP connection and the session built on top of it.

mod client;
mod config;
mod stream;

pub use client::{SessionState, SmtpTransport, build_payload};
pub use config::{
    Credentials, DEFAULT_MAX_BUFFER, Security, SmtpConfig, SmtpConfigBuilder, system_hostname,
};
pub use stream::{SmtpStream, default_tls_config, open};

use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::Reply;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;

/// A line-oriented connection to an SMTP server.
///
/// Knows nothing about SMTP semantics beyond the reply framing: it reads
/// (possibly multi-line) replies, writes CRLF-terminated lines under a
/// size limit, and can be upgraded to TLS once.
#[derive(Debug)]
pub struct Connection {
    stream: Option<SmtpStream>,
    host: String,
    port: u16,
    max_buffer: usize,
    tls: Option<Arc<ClientConfig>>,
}

impl Connection {
    /// Connects to `host:port`.
    ///
    /// `tls` is used for implicit TLS and for a later
    /// [`Connection::enable_crypto`]; `None` selects [`default_tls_config`].
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be opened or the implicit TLS
    /// handshake fails.
    pub fn connect(
        host: &str,
        port: u16,
        implicit_tls: bool,
        timeout: Duration,
        tls: Option<Arc<ClientConfig>>,
    ) -> Result<Self> {
        let initial = implicit_tls.then(|| tls.clone().unwrap_or_else(default_tls_config));
        let stream = open(host, port, initial, timeout)?;
        tracing::debug!(host, port, tls = implicit_tls, "Connected");
        Ok(Self::from_stream(stream, host, port).with_tls_config(tls))
    }

    /// Wraps an already open stream.
    #[must_use]
    pub fn from_stream(stream: SmtpStream, host: impl Into<String>, port: u16) -> Self {
        Self {
            stream: Some(stream),
            host: host.into(),
            port,
            max_buffer: DEFAULT_MAX_BUFFER,
            tls: None,
        }
    }

    /// Sets the TLS client configuration for [`Connection::enable_crypto`].
    #[must_use]
    pub fn with_tls_config(mut self, tls: Option<Arc<ClientConfig>>) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the initial line limit. The server may only lower it afterwards.
    #[must_use]
    pub const fn with_max_buffer(mut self, size: usize) -> Self {
        self.max_buffer = size;
        self
    }

    fn stream_mut(&mut self) -> Result<&mut SmtpStream> {
        self.stream.as_mut().ok_or(Error::Closed)
    }

    /// Reads one reply.
    ///
    /// Lines are read until one without a `-` continuation marker. If the
    /// server closes the stream before sending anything, the reply carries
    /// [`ReplyCode::NONE`](crate::types::ReplyCode::NONE).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the reply is malformed.
    pub fn read_reply(&mut self) -> Result<Reply> {
        let stream = self.stream_mut()?;
        let mut lines = Vec::new();

        while let Some(line) = stream.read_line()? {
            tracing::trace!("<< {line}");
            if line.is_empty() {
                continue;
            }

            let is_last = is_last_reply_line(&line);
            lines.push(line);
            if is_last {
                break;
            }
        }

        parse_reply(&lines)
    }

    /// Writes `line` followed by CRLF.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeLimitExceeded`] if the line plus CRLF is larger
    /// than the current limit, or an I/O error.
    pub fn write(&mut self, line: &str) -> Result<()> {
        if line.contains('\n') {
            tracing::trace!(bytes = line.len(), ">> <message data>");
        } else {
            tracing::trace!(">> {line}");
        }
        self.write_raw(line)
    }

    /// Writes an authentication payload without logging its content.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::write`].
    pub fn write_credentials(&mut self, line: &str) -> Result<()> {
        tracing::trace!(">> <credentials>");
        self.write_raw(line)
    }

    fn write_raw(&mut self, line: &str) -> Result<()> {
        let size = line.len() + 2;
        if size > self.max_buffer {
            return Err(Error::SizeLimitExceeded {
                size,
                limit: self.max_buffer,
            });
        }

        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.stream_mut()?.write_all(&data)
    }

    /// Upgrades the connection to TLS, verifying the server as `host()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyEncrypted`] on an encrypted connection, or
    /// the handshake error. A failed handshake leaves the connection closed.
    pub fn enable_crypto(&mut self) -> Result<()> {
        if self.is_secure() {
            return Err(Error::AlreadyEncrypted);
        }
        let config = self.tls.clone().unwrap_or_else(default_tls_config);
        let stream = self.stream.take().ok_or(Error::Closed)?;
        self.stream = Some(stream.upgrade_to_tls(&self.host, config)?);
        Ok(())
    }

    /// Lowers the line limit to `size`. Larger values are ignored.
    pub fn set_max_buffer(&mut self, size: usize) {
        if size < self.max_buffer {
            tracing::debug!(from = self.max_buffer, to = size, "Tightening line limit");
            self.max_buffer = size;
        }
    }

    /// Closes the connection. Calling it again has no effect.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
            tracing::debug!(host = %self.host, "Connection closed");
        }
    }

    /// Returns the server host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.stream.as_ref().is_some_and(SmtpStream::is_tls)
    }

    /// Returns the current line limit.
    #[must_use]
    pub const fn max_buffer(&self) -> usize {
        self.max_buffer
    }

    /// Returns true once [`Connection::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.stream.is_none()
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
    use crate::types::ReplyCode;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{Shutdown, TcpListener, TcpStream};
    use std::thread;

    /// Connects to a loopback peer that writes `script`, closes its write
    /// half, and returns every line it received.
    ///
    /// The client may close first, so the peer ignores write errors.
    fn scripted(script: &'static [u8]) -> (Connection, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let _ = socket.write_all(script);
            let _ = socket.shutdown(Shutdown::Write);
            let reader = BufReader::new(socket);
            reader.lines().map_while(std::result::Result::ok).collect()
        });
        let tcp = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let conn = Connection::from_stream(SmtpStream::Tcp(BufReader::new(tcp)), "127.0.0.1", port);
        (conn, server)
    }

    #[test]
    fn test_multiline_reply() {
        let (mut conn, server) = scripted(b"250-foo\r\n250 bar\r\n");
        let reply = conn.read_reply().unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message_text(), "foo\r\nbar");
        conn.close();
        server.join().unwrap();
    }

    #[test]
    fn test_eof_without_reply_yields_sentinel() {
        let (mut conn, server) = scripted(b"");
        let reply = conn.read_reply().unwrap();
        assert_eq!(reply.code, ReplyCode::NONE);
        assert!(reply.message.is_empty());
        conn.close();
        server.join().unwrap();
    }

    #[test]
    fn test_read_after_close_fails() {
        let (mut conn, server) = scripted(b"220 hi\r\n");
        conn.close();
        assert!(matches!(conn.read_reply(), Err(Error::Closed)));
        assert!(server.join().unwrap().is_empty());
    }

    #[test]
    fn test_write_appends_crlf_and_respects_limit() {
        let (conn, server) = scripted(b"");
        let mut conn = conn.with_max_buffer(8);
        conn.write("NOOP").unwrap();
        conn.write("ABCDEF").unwrap();
        let err = conn.write("ABCDEFG").unwrap_err();
        assert!(matches!(err, Error::SizeLimitExceeded { size: 9, limit: 8 }));
        conn.close();
        assert_eq!(server.join().unwrap(), vec!["NOOP", "ABCDEF"]);
    }

    #[test]
    fn test_max_buffer_only_shrinks() {
        let (mut conn, server) = scripted(b"");
        assert_eq!(conn.max_buffer(), 65536);
        conn.set_max_buffer(100_000);
        assert_eq!(conn.max_buffer(), 65536);
        conn.set_max_buffer(1000);
        assert_eq!(conn.max_buffer(), 1000);
        conn.close();
        server.join().unwrap();
    }

    /// Client settings trusting a fresh self-signed `localhost` certificate,
    /// plus a loopback peer that completes the handshake and returns the
    /// plaintext it received.
    fn tls_peer() -> (Connection, thread::JoinHandle<Vec<u8>>) {
        use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
        use rustls::{RootCertStore, ServerConfig, ServerConnection, StreamOwned};
        use std::io::Read;

        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
        let key_der =
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));

        let mut roots = RootCertStore::empty();
        roots.add(cert_der.clone()).unwrap();
        let client = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let server = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let conn = ServerConnection::new(Arc::new(server)).unwrap();
            let mut tls = StreamOwned::new(conn, socket);
            let mut received = Vec::new();
            let _ = tls.read_to_end(&mut received);
            received
        });

        let tcp = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let conn = Connection::from_stream(SmtpStream::Tcp(BufReader::new(tcp)), "localhost", port)
            .with_tls_config(Some(Arc::new(client)));
        (conn, handle)
    }

    #[test]
    fn test_enable_crypto_only_once() {
        let (mut conn, server) = tls_peer();
        assert!(!conn.is_secure());

        conn.enable_crypto().unwrap();
        assert!(conn.is_secure());
        assert!(matches!(conn.enable_crypto(), Err(Error::AlreadyEncrypted)));
        assert!(conn.is_secure());

        conn.write("NOOP").unwrap();
        conn.close();
        assert_eq!(server.join().unwrap(), b"NOOP\r\n");
    }

    #[test]
    fn test_enable_crypto_after_close_fails() {
        let (mut conn, _server) = scripted(b"");
        conn.close();
        assert!(matches!(conn.enable_crypto(), Err(Error::Closed)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut conn, server) = scripted(b"");
        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert!(!conn.is_secure());
        assert!(matches!(conn.write("QUIT"), Err(Error::Closed)));
        server.join().unwrap();
    }
}
