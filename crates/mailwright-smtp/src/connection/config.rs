//! Session configuration types.

use rustls::ClientConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default outbound line limit until the server tightens it.
pub const DEFAULT_MAX_BUFFER: usize = 65536;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext only, STARTTLS is never attempted.
    None,
    /// Plaintext, upgraded with STARTTLS when the server advertises it.
    #[default]
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 25,
            Self::Implicit => 465,
        }
    }

    /// Returns true if the connection is encrypted from the first byte.
    #[must_use]
    pub const fn is_implicit(self) -> bool {
        matches!(self, Self::Implicit)
    }

    /// Returns true if STARTTLS should be attempted on a plaintext session.
    #[must_use]
    pub const fn wants_starttls(self) -> bool {
        matches!(self, Self::StartTls)
    }
}

/// Username and password for SASL authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Secret.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SMTP session configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connect, read and write timeout.
    pub timeout: Duration,
    /// Name announced in EHLO/HELO.
    pub local_hostname: String,
    /// Credentials, if the session should authenticate.
    pub credentials: Option<Credentials>,
    /// Initial outbound line limit.
    pub max_buffer: usize,
    /// TLS client settings. `None` verifies servers against the webpki roots.
    pub tls: Option<Arc<ClientConfig>>,
}

impl SmtpConfig {
    /// Creates a configuration for `host` with default settings.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        SmtpConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SmtpConfigBuilder {
        SmtpConfigBuilder::new(host)
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    timeout: Duration,
    local_hostname: Option<String>,
    credentials: Option<Credentials>,
    max_buffer: usize,
    tls: Option<Arc<ClientConfig>>,
}

impl SmtpConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::default(),
            timeout: Duration::from_secs(10),
            local_hostname: None,
            credentials: None,
            max_buffer: DEFAULT_MAX_BUFFER,
            tls: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connect and I/O timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the name announced in EHLO/HELO.
    #[must_use]
    pub fn local_hostname(mut self, name: impl Into<String>) -> Self {
        self.local_hostname = Some(name.into());
        self
    }

    /// Sets the login credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the initial outbound line limit.
    ///
    /// Every command line and the whole DATA payload (headers, body and
    /// base64 attachments) must fit in this limit, which defaults to
    /// [`DEFAULT_MAX_BUFFER`]. A server `SIZE` can only lower it, so raise it
    /// here to send messages larger than 64 KiB.
    #[must_use]
    pub const fn max_buffer(mut self, size: usize) -> Self {
        self.max_buffer = size;
        self
    }

    /// Sets the TLS client configuration used for implicit TLS and STARTTLS.
    #[must_use]
    pub fn tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SmtpConfig {
        SmtpConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            timeout: self.timeout,
            local_hostname: self.local_hostname.unwrap_or_else(system_hostname),
            credentials: self.credentials,
            max_buffer: self.max_buffer,
            tls: self.tls,
        }
    }
}

/// Returns the machine's host name, or `localhost` if it cannot be read.
#[must_use]
pub fn system_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
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

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 25);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_config_defaults() {
        let config = SmtpConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 25);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_buffer, 65536);
        assert!(config.credentials.is_none());
        assert!(config.tls.is_none());
        assert!(!config.local_hostname.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = SmtpConfig::builder("smtp.example.com")
            .security(Security::Implicit)
            .timeout(Duration::from_secs(3))
            .local_hostname("client.example.com")
            .credentials("user", "secret")
            .max_buffer(16 * 1024 * 1024)
            .build();

        assert_eq!(config.port, 465);
        assert_eq!(config.max_buffer, 16 * 1024 * 1024);
        assert_eq!(config.address(), "smtp.example.com:465");
        assert_eq!(config.local_hostname, "client.example.com");
        assert_eq!(config.credentials, Some(Credentials::new("user", "secret")));
    }

    #[test]
    fn test_explicit_port_wins() {
        let config = SmtpConfig::builder("smtp.example.com")
            .security(Security::StartTls)
            .port(587)
            .build();
        assert_eq!(config.port, 587);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
