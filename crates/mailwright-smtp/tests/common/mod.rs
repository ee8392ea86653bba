//! Scripted SMTP server on a loopback socket.

#![allow(dead_code, clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mailwright_smtp::{Security, SmtpConfig, SmtpConfigBuilder};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig, ServerConnection, StreamOwned};

/// What the server saw during one session.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Command lines in arrival order (DATA content excluded).
    pub commands: Vec<String>,
    /// DATA payloads, lines joined with CRLF, terminator excluded.
    pub messages: Vec<String>,
}

impl Transcript {
    pub fn count(&self, command: &str) -> usize {
        self.commands.iter().filter(|c| *c == command).count()
    }

    pub fn saw(&self, command: &str) -> bool {
        self.count(command) > 0
    }
}

/// How the server encrypts the session.
#[derive(Clone)]
enum ServerTls {
    Plain,
    StartTls(Arc<ServerConfig>),
    Implicit(Arc<ServerConfig>),
}

enum Flow {
    Done,
    StartTls,
}

/// A single-connection SMTP server driven by a reply function.
///
/// The function maps each received line to the raw reply text (multi-line
/// replies separated by CRLF). After a `354` reply to `DATA` the server
/// collects the payload up to the lone `.` and asks the function for the
/// reply to `"."`.
pub struct FakeServer {
    pub port: u16,
    handle: Option<JoinHandle<Transcript>>,
}

impl FakeServer {
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + 'static,
    {
        Self::spawn(GREETING, ServerTls::Plain, respond)
    }

    pub fn with_greeting<F>(greeting: &'static str, respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + 'static,
    {
        Self::spawn(greeting, ServerTls::Plain, respond)
    }

    /// Upgrades the socket after a `220` reply to `STARTTLS`.
    pub fn starttls<F>(config: Arc<ServerConfig>, respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + 'static,
    {
        Self::spawn(GREETING, ServerTls::StartTls(config), respond)
    }

    /// Speaks TLS from the first byte.
    pub fn implicit_tls<F>(config: Arc<ServerConfig>, respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + 'static,
    {
        Self::spawn(GREETING, ServerTls::Implicit(config), respond)
    }

    fn spawn<F>(greeting: &'static str, tls: ServerTls, respond: F) -> Self
    where
        F: Fn(&str) -> String + Send + 'static,
    {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || serve(&listener, greeting, tls, &respond));
        Self {
            port,
            handle: Some(handle),
        }
    }

    /// Configuration pointing at this server, plaintext by default.
    pub fn config(&self) -> SmtpConfigBuilder {
        self.config_for_host("127.0.0.1")
    }

    /// Configuration that trusts `client` and verifies the server as
    /// `localhost`.
    pub fn secure_config(&self, client: Arc<ClientConfig>) -> SmtpConfigBuilder {
        self.config_for_host("localhost").tls_config(client)
    }

    pub fn config_for_host(&self, host: &str) -> SmtpConfigBuilder {
        SmtpConfig::builder(host)
            .port(self.port)
            .security(Security::StartTls)
            .local_hostname("client.test")
            .timeout(Duration::from_secs(5))
    }

    /// Waits for the session to end and returns what was received.
    pub fn finish(mut self) -> Transcript {
        self.handle.take().unwrap().join().unwrap()
    }
}

const GREETING: &str = "220 fake.example.com ESMTP ready";

/// Routes client logs to the test output, filtered by `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn serve(
    listener: &TcpListener,
    greeting: &str,
    tls: ServerTls,
    respond: &dyn Fn(&str) -> String,
) -> Transcript {
    let mut transcript = Transcript::default();
    let (socket, _) = listener.accept().unwrap();

    match tls {
        ServerTls::Implicit(config) => {
            let stream = StreamOwned::new(ServerConnection::new(config).unwrap(), socket);
            let mut reader = BufReader::new(stream);
            reply(reader.get_mut(), greeting);
            session(&mut reader, respond, &mut transcript, false);
        }
        plain => {
            let mut reader = BufReader::new(socket);
            reply(reader.get_mut(), greeting);
            let upgrade = matches!(plain, ServerTls::StartTls(_));
            if let (Flow::StartTls, ServerTls::StartTls(config)) =
                (session(&mut reader, respond, &mut transcript, upgrade), plain)
            {
                let stream =
                    StreamOwned::new(ServerConnection::new(config).unwrap(), reader.into_inner());
                let mut reader = BufReader::new(stream);
                session(&mut reader, respond, &mut transcript, false);
            }
        }
    }

    transcript
}

fn session<S: Read + Write>(
    reader: &mut BufReader<S>,
    respond: &dyn Fn(&str) -> String,
    transcript: &mut Transcript,
    upgrade: bool,
) -> Flow {
    while let Some(line) = read_line(reader) {
        transcript.commands.push(line.clone());
        let answer = respond(&line);
        reply(reader.get_mut(), &answer);

        if line == "QUIT" {
            break;
        }
        if upgrade && line == "STARTTLS" && answer.starts_with("220") {
            return Flow::StartTls;
        }
        if line == "DATA" && answer.starts_with("354") {
            let mut payload = Vec::new();
            loop {
                match read_line(reader) {
                    Some(data) if data == "." => break,
                    Some(data) => payload.push(data),
                    None => return Flow::Done,
                }
            }
            transcript.messages.push(payload.join("\r\n"));
            reply(reader.get_mut(), &respond("."));
        }
    }

    Flow::Done
}

fn read_line<R: BufRead>(reader: &mut R) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

fn reply<W: Write>(writer: &mut W, text: &str) {
    let _ = writer.write_all(format!("{text}\r\n").as_bytes());
    let _ = writer.flush();
}

/// Replies for a plain server advertising `extensions` after EHLO.
pub fn basic(extensions: &'static [&'static str]) -> impl Fn(&str) -> String + Send + 'static {
    move |line| respond_basic(line, extensions)
}

pub fn respond_basic(line: &str, extensions: &[&str]) -> String {
    if line.starts_with("EHLO ") {
        return ehlo_reply(extensions);
    }
    match line {
        "DATA" => "354 End data with <CR><LF>.<CR><LF>".to_string(),
        "QUIT" => "221 Bye".to_string(),
        _ => "250 OK".to_string(),
    }
}

pub fn ehlo_reply(extensions: &[&str]) -> String {
    let mut lines = vec!["fake.example.com Hello".to_string()];
    lines.extend(extensions.iter().map(ToString::to_string));
    let last = lines.len() - 1;
    lines
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let sep = if i == last { ' ' } else { '-' };
            format!("250{sep}{text}")
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Server and client TLS settings sharing one self-signed `localhost`
/// certificate.
pub struct TestTls {
    pub server: Arc<ServerConfig>,
    pub client: Arc<ClientConfig>,
}

pub fn self_signed() -> TestTls {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));

    let mut roots = RootCertStore::empty();
    roots.add(cert_der.clone()).unwrap();
    let client = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let server = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .unwrap();

    TestTls {
        server: Arc::new(server),
        client: Arc::new(client),
    }
}
