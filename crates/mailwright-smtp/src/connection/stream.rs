//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<TlsStream>>),
}

impl SmtpStream {
    /// Reads a line from the stream, without its terminator.
    ///
    /// Returns `None` once the server has closed the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or times out.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let read = match self {
            Self::Tcp(reader) => reader.read_until(b'\n', &mut buf)?,
            Self::Tls(reader) => reader.read_until(b'\n', &mut buf)?,
        };
        if read == 0 {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or times out.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data)?;
                reader.get_mut().flush()?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data)?;
                reader.get_mut().flush()?;
            }
        }
        Ok(())
    }

    /// Returns true if the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Upgrades a TCP stream to TLS and completes the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the handshake
    /// fails.
    pub fn upgrade_to_tls(self, hostname: &str, config: Arc<ClientConfig>) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::AlreadyEncrypted),
        };
        wrap_tls(tcp_stream, hostname, config)
    }

    /// Shuts down the underlying socket.
    pub fn shutdown(&mut self) {
        let tcp = match self {
            Self::Tcp(reader) => reader.get_mut(),
            Self::Tls(reader) => {
                let tls = reader.get_mut();
                tls.conn.send_close_notify();
                let _ = tls.flush();
                &mut tls.sock
            }
        };
        let _ = tcp.shutdown(std::net::Shutdown::Both);
    }
}

/// Opens a stream to `hostname:port`, encrypted from the start with `tls`
/// if it is given.
///
/// `timeout` bounds the connect attempt and every later read and write.
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub fn open(
    hostname: &str,
    port: u16,
    tls: Option<Arc<ClientConfig>>,
    timeout: Duration,
) -> Result<SmtpStream> {
    let address = format!("{hostname}:{port}");
    let tcp_stream = connect_tcp(hostname, port, timeout).map_err(|source| Error::Connection {
        address: address.clone(),
        source,
    })?;
    tcp_stream.set_read_timeout(Some(timeout))?;
    tcp_stream.set_write_timeout(Some(timeout))?;

    match tls {
        Some(config) => wrap_tls(tcp_stream, hostname, config),
        None => Ok(SmtpStream::Tcp(BufReader::new(tcp_stream))),
    }
}

fn connect_tcp(hostname: &str, port: u16, timeout: Duration) -> std::io::Result<TcpStream> {
    let mut last_error = None;
    for addr in (hostname, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses found for {hostname}"),
        )
    }))
}

fn wrap_tls(
    mut tcp_stream: TcpStream,
    hostname: &str,
    config: Arc<ClientConfig>,
) -> Result<SmtpStream> {
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::InvalidHostname(hostname.to_string()))?;

    let mut conn = ClientConnection::new(config, server_name)?;
    while conn.is_handshaking() {
        conn.complete_io(&mut tcp_stream)
            .map_err(|source| Error::Handshake {
                host: hostname.to_string(),
                source,
            })?;
    }

    tracing::debug!(host = hostname, "TLS handshake complete");
    Ok(SmtpStream::Tls(Box::new(BufReader::new(StreamOwned::new(
        conn, tcp_stream,
    )))))
}

/// Creates a TLS client configuration with the webpki root certificates.
#[must_use]
pub fn default_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}
