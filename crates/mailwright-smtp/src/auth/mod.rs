//! SASL authentication.
//!
//! [`authenticate`] picks the strongest mechanism the server advertises and
//! runs its exchange over an [`AuthSession`]. Supported, in order of
//! preference: `DIGEST-MD5`, `CRAM-MD5`, `LOGIN`, `PLAIN`, `ANONYMOUS`.

mod cram_md5;
mod digest_md5;

pub use digest_md5::{DigestChallenge, DigestResponse};

use crate::command::Command;
use crate::connection::{Connection, Credentials};
use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// DIGEST-MD5 - RFC 2831 digest challenge-response
    DigestMd5,
    /// CRAM-MD5 - HMAC challenge-response
    CramMd5,
    /// LOGIN - legacy plaintext
    Login,
    /// PLAIN - plaintext authentication
    Plain,
    /// ANONYMOUS - no exchange
    Anonymous,
}

impl AuthMechanism {
    /// All mechanisms, most preferred first.
    pub const PRIORITY: [Self; 5] = [
        Self::DigestMd5,
        Self::CramMd5,
        Self::Login,
        Self::Plain,
        Self::Anonymous,
    ];

    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|mechanism| mechanism.as_str().eq_ignore_ascii_case(s))
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DigestMd5 => "DIGEST-MD5",
            Self::CramMd5 => "CRAM-MD5",
            Self::Login => "LOGIN",
            Self::Plain => "PLAIN",
            Self::Anonymous => "ANONYMOUS",
        }
    }

    /// Picks the preferred mechanism from a space-separated AUTH list.
    #[must_use]
    pub fn select(advertised: &str) -> Option<Self> {
        let offered: Vec<Self> = advertised
            .split_whitespace()
            .filter_map(Self::parse)
            .collect();
        Self::PRIORITY
            .into_iter()
            .find(|mechanism| offered.contains(mechanism))
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operations a SASL exchange needs from the session.
pub trait AuthSession {
    /// Writes a command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn send(&mut self, line: &str) -> Result<()>;

    /// Writes a line carrying secrets. Implementations must not log it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn send_credentials(&mut self, line: &str) -> Result<()>;

    /// Reads one reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn receive(&mut self) -> Result<Reply>;

    /// Returns the server host name.
    fn host(&self) -> &str;

    /// Returns the current line limit.
    fn max_buffer(&self) -> usize;

    /// Lowers the line limit.
    fn set_max_buffer(&mut self, size: usize);
}

impl AuthSession for Connection {
    fn send(&mut self, line: &str) -> Result<()> {
        self.write(line)
    }

    fn send_credentials(&mut self, line: &str) -> Result<()> {
        self.write_credentials(line)
    }

    fn receive(&mut self) -> Result<Reply> {
        self.read_reply()
    }

    fn host(&self) -> &str {
        Self::host(self)
    }

    fn max_buffer(&self) -> usize {
        Self::max_buffer(self)
    }

    fn set_max_buffer(&mut self, size: usize) {
        Self::set_max_buffer(self, size);
    }
}

/// Authenticates with the preferred mechanism among `advertised`.
///
/// Returns the mechanism that succeeded.
///
/// # Errors
///
/// - [`Error::AuthUnsupported`] if no known mechanism is advertised
/// - [`Error::AuthFailed`] if the server rejects the credentials (535)
/// - [`Error::UnexpectedReply`] for any other reply code
pub fn authenticate<S: AuthSession + ?Sized>(
    session: &mut S,
    advertised: &str,
    credentials: &Credentials,
) -> Result<AuthMechanism> {
    let mechanism = AuthMechanism::select(advertised).ok_or_else(|| Error::AuthUnsupported {
        advertised: advertised.to_string(),
    })?;
    tracing::debug!(%mechanism, advertised, "Authenticating");

    let reply = match mechanism {
        AuthMechanism::Anonymous => return Ok(mechanism),
        AuthMechanism::Plain => plain(session, credentials)?,
        AuthMechanism::Login => login(session, credentials)?,
        AuthMechanism::CramMd5 => cram_md5::exchange(session, credentials)?,
        AuthMechanism::DigestMd5 => digest_md5::exchange(session, credentials)?,
    };

    match reply.code {
        ReplyCode::AUTH_SUCCESS => {
            tracing::debug!(%mechanism, "Authenticated");
            Ok(mechanism)
        }
        ReplyCode::AUTH_FAILED => Err(Error::AuthFailed {
            mechanism: mechanism.as_str(),
            code: reply.code,
        }),
        code => Err(Error::unexpected("AUTH", code, reply.message_text())),
    }
}

/// Sends `AUTH <mechanism>` and requires a 334 continuation.
fn begin<S: AuthSession + ?Sized>(session: &mut S, mechanism: AuthMechanism) -> Result<Reply> {
    session.send(
        &Command::Auth {
            mechanism: mechanism.as_str(),
        }
        .to_string(),
    )?;
    expect_continue(session)
}

fn expect_continue<S: AuthSession + ?Sized>(session: &mut S) -> Result<Reply> {
    let reply = session.receive()?;
    if reply.code != ReplyCode::AUTH_CONTINUE {
        return Err(Error::unexpected("AUTH", reply.code, reply.message_text()));
    }
    Ok(reply)
}

/// Decodes the base64 challenge carried by a 334 reply.
fn decode_challenge(reply: &Reply) -> Result<Vec<u8>> {
    STANDARD
        .decode(reply.message_text().trim())
        .map_err(|e| Error::Protocol(format!("Invalid base64 challenge: {e}")))
}

fn plain<S: AuthSession + ?Sized>(session: &mut S, credentials: &Credentials) -> Result<Reply> {
    begin(session, AuthMechanism::Plain)?;
    let token = format!("\0{}\0{}", credentials.username, credentials.password);
    session.send_credentials(&STANDARD.encode(token))?;
    session.receive()
}

fn login<S: AuthSession + ?Sized>(session: &mut S, credentials: &Credentials) -> Result<Reply> {
    begin(session, AuthMechanism::Login)?;
    session.send_credentials(&STANDARD.encode(&credentials.username))?;
    expect_continue(session)?;
    session.send_credentials(&STANDARD.encode(&credentials.password))?;
    session.receive()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::AuthSession;
    use crate::error::Result;
    use crate::types::{Reply, ReplyCode};
    use std::collections::VecDeque;

    /// In-memory session that answers with canned replies.
    #[derive(Debug)]
    pub struct ScriptedSession {
        replies: VecDeque<Reply>,
        pub sent: Vec<String>,
        pub max_buffer: usize,
    }

    impl ScriptedSession {
        pub fn new(replies: &[(i16, &str)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(code, text)| {
                        Reply::new(ReplyCode::new(*code), vec![(*text).to_string()])
                    })
                    .collect(),
                sent: Vec::new(),
                max_buffer: 65536,
            }
        }
    }

    impl AuthSession for ScriptedSession {
        fn send(&mut self, line: &str) -> Result<()> {
            self.sent.push(line.to_string());
            Ok(())
        }

        fn send_credentials(&mut self, line: &str) -> Result<()> {
            self.send(line)
        }

        fn receive(&mut self) -> Result<Reply> {
            Ok(self.replies.pop_front().unwrap_or_else(Reply::none))
        }

        fn host(&self) -> &str {
            "mail.example.com"
        }

        fn max_buffer(&self) -> usize {
            self.max_buffer
        }

        fn set_max_buffer(&mut self, size: usize) {
            self.max_buffer = self.max_buffer.min(size);
        }
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
    use super::testing::ScriptedSession;
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("user", "pass")
    }

    #[test]
    fn test_select_priority() {
        assert_eq!(AuthMechanism::select("LOGIN PLAIN"), Some(AuthMechanism::Login));
        assert_eq!(AuthMechanism::select("PLAIN LOGIN"), Some(AuthMechanism::Login));
        assert_eq!(
            AuthMechanism::select("plain cram-md5 DIGEST-MD5"),
            Some(AuthMechanism::DigestMd5)
        );
        assert_eq!(
            AuthMechanism::select("XOAUTH2 ANONYMOUS"),
            Some(AuthMechanism::Anonymous)
        );
        assert_eq!(AuthMechanism::select("XOAUTH2 GSSAPI"), None);
        assert_eq!(AuthMechanism::select(""), None);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(AuthMechanism::parse("cram-md5"), Some(AuthMechanism::CramMd5));
        assert_eq!(AuthMechanism::parse("NTLM"), None);
        assert_eq!(AuthMechanism::DigestMd5.to_string(), "DIGEST-MD5");
    }

    #[test]
    fn test_plain_exchange() {
        let mut session = ScriptedSession::new(&[(334, ""), (235, "ok")]);
        let mechanism = authenticate(&mut session, "PLAIN", &creds()).unwrap();
        assert_eq!(mechanism, AuthMechanism::Plain);
        assert_eq!(session.sent, vec!["AUTH PLAIN", "AHVzZXIAcGFzcw=="]);
    }

    #[test]
    fn test_login_exchange() {
        let mut session = ScriptedSession::new(&[
            (334, "VXNlcm5hbWU6"),
            (334, "UGFzc3dvcmQ6"),
            (235, "ok"),
        ]);
        let mechanism = authenticate(&mut session, "LOGIN PLAIN", &creds()).unwrap();
        assert_eq!(mechanism, AuthMechanism::Login);
        assert_eq!(session.sent, vec!["AUTH LOGIN", "dXNlcg==", "cGFzcw=="]);
    }

    #[test]
    fn test_rejected_credentials() {
        let mut session = ScriptedSession::new(&[(334, ""), (535, "bad credentials")]);
        let err = authenticate(&mut session, "PLAIN", &creds()).unwrap_err();
        assert!(matches!(
            err,
            Error::AuthFailed {
                mechanism: "PLAIN",
                code: ReplyCode::AUTH_FAILED
            }
        ));
    }

    #[test]
    fn test_unrecognized_final_code() {
        let mut session = ScriptedSession::new(&[(334, ""), (454, "temporary failure")]);
        let err = authenticate(&mut session, "PLAIN", &creds()).unwrap_err();
        assert_eq!(err.reply_code(), Some(ReplyCode::new(454)));
        assert!(matches!(err, Error::UnexpectedReply { step: "AUTH", .. }));
    }

    #[test]
    fn test_missing_continuation() {
        let mut session = ScriptedSession::new(&[(504, "not implemented")]);
        let err = authenticate(&mut session, "LOGIN", &creds()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedReply { .. }));
        assert_eq!(session.sent, vec!["AUTH LOGIN"]);
    }

    #[test]
    fn test_anonymous_needs_no_exchange() {
        let mut session = ScriptedSession::new(&[]);
        let mechanism = authenticate(&mut session, "ANONYMOUS", &creds()).unwrap();
        assert_eq!(mechanism, AuthMechanism::Anonymous);
        assert!(session.sent.is_empty());
    }

    #[test]
    fn test_unsupported() {
        let mut session = ScriptedSession::new(&[]);
        let err = authenticate(&mut session, "XOAUTH2", &creds()).unwrap_err();
        assert!(matches!(err, Error::AuthUnsupported { advertised } if advertised == "XOAUTH2"));
    }
}
