//! DIGEST-MD5 (RFC 2831), `qop=auth` only.

use super::{AuthMechanism, AuthSession, begin, decode_challenge};
use crate::connection::{Credentials, DEFAULT_MAX_BUFFER};
use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};
use std::collections::HashMap;

const NONCE_COUNT: &str = "00000001";

/// A parsed server challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Server nonce.
    pub nonce: String,
    /// Realm, empty if none was offered.
    pub realm: String,
    /// Offered quality-of-protection values.
    pub qop: Vec<String>,
    /// Server receive buffer size.
    pub maxbuf: usize,
    /// Algorithm (normally `md5-sess`).
    pub algorithm: String,
}

impl DigestChallenge {
    /// Parses a decoded challenge of comma-separated `key=value` pairs.
    ///
    /// `opaque` and `domain` are ignored. Missing `realm`, `maxbuf` and
    /// `qop` default to empty, 65536 and `auth`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `nonce` or `algorithm` is missing.
    pub fn parse(challenge: &str) -> Result<Self> {
        let attrs: HashMap<String, String> = attributes(challenge)
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();

        let required = |key: &str| {
            attrs
                .get(key)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| Error::Protocol(format!("DIGEST-MD5 challenge without {key}")))
        };
        let nonce = required("nonce")?;
        let algorithm = required("algorithm")?;

        let qop = attrs
            .get("qop")
            .map(|qop| {
                qop.split(',')
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|qop| !qop.is_empty())
            .unwrap_or_else(|| vec!["auth".to_string()]);

        Ok(Self {
            nonce,
            realm: attrs.get("realm").cloned().unwrap_or_default(),
            qop,
            maxbuf: attrs
                .get("maxbuf")
                .and_then(|maxbuf| maxbuf.parse().ok())
                .filter(|maxbuf| *maxbuf > 0)
                .unwrap_or(DEFAULT_MAX_BUFFER),
            algorithm,
        })
    }

    /// Returns true if plain authentication (`qop=auth`) is offered.
    #[must_use]
    pub fn offers_auth(&self) -> bool {
        self.qop.iter().any(|qop| qop == "auth")
    }
}

/// Splits `key=value,key="quoted value"` into pairs.
fn attributes(input: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim().to_string();
        rest = &rest[eq + 1..];

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let mut value = String::new();
            let mut escaped = false;
            let mut end = quoted.len();
            for (i, c) in quoted.char_indices() {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => {
                        end = i + 1;
                        break;
                    }
                    _ => {
                        value.push(c);
                        escaped = false;
                    }
                }
            }
            rest = &quoted[end..];
            value
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let value = rest[..end].trim().to_string();
            rest = &rest[end..];
            value
        };

        if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            pairs.push((key, value));
        }
    }

    pairs
}

/// The fields of a client response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResponse<'a> {
    /// Login name.
    pub username: &'a str,
    /// Realm echoed from the challenge.
    pub realm: &'a str,
    /// Server nonce.
    pub nonce: &'a str,
    /// Client nonce.
    pub cnonce: &'a str,
    /// Chosen quality of protection.
    pub qop: &'a str,
    /// `smtp/<host>`.
    pub digest_uri: String,
    /// Client receive buffer size.
    pub maxbuf: usize,
}

impl DigestResponse<'_> {
    /// Computes the `response` value.
    #[must_use]
    pub fn response_value(&self, password: &str) -> String {
        let secret = Md5::digest(format!("{}:{}:{password}", self.username, self.realm));
        let mut a1 = secret.to_vec();
        a1.extend_from_slice(format!(":{}:{}", self.nonce, self.cnonce).as_bytes());
        let ha1 = md5_hex(&a1);

        let mut a2 = format!("AUTHENTICATE:{}", self.digest_uri);
        if self.qop != "auth" {
            a2.push_str(&"0".repeat(32));
        }
        let ha2 = md5_hex(a2.as_bytes());

        md5_hex(
            format!(
                "{ha1}:{}:{NONCE_COUNT}:{}:{}:{ha2}",
                self.nonce, self.cnonce, self.qop
            )
            .as_bytes(),
        )
    }

    /// Serializes the response as `key="value"` pairs.
    #[must_use]
    pub fn to_token(&self, password: &str) -> String {
        let maxbuf = self.maxbuf.to_string();
        let response = self.response_value(password);
        [
            ("username", self.username),
            ("realm", self.realm),
            ("nonce", self.nonce),
            ("cnonce", self.cnonce),
            ("nc", NONCE_COUNT),
            ("qop", self.qop),
            ("digest-uri", self.digest_uri.as_str()),
            ("maxbuf", maxbuf.as_str()),
            ("response", response.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("{key}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(",")
    }
}

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

pub(super) fn exchange<S: AuthSession + ?Sized>(
    session: &mut S,
    credentials: &Credentials,
) -> Result<Reply> {
    let raw = decode_challenge(&begin(session, AuthMechanism::DigestMd5)?)?;
    let challenge = DigestChallenge::parse(&String::from_utf8_lossy(&raw))?;

    session.set_max_buffer(challenge.maxbuf);
    if !challenge.offers_auth() {
        return Err(Error::Protocol(format!(
            "No supported qop method, server offers: {}",
            challenge.qop.join(",")
        )));
    }

    let cnonce = hex::encode(rand::random::<[u8; 16]>());
    let response = DigestResponse {
        username: &credentials.username,
        realm: &challenge.realm,
        nonce: &challenge.nonce,
        cnonce: &cnonce,
        qop: "auth",
        digest_uri: format!("smtp/{}", session.host()),
        maxbuf: session.max_buffer(),
    };
    session.send_credentials(&STANDARD.encode(response.to_token(&credentials.password)))?;

    let reply = session.receive()?;
    if reply.code == ReplyCode::AUTH_FAILED {
        return Ok(reply);
    }
    if reply.code != ReplyCode::AUTH_CONTINUE {
        return Err(Error::unexpected("AUTH", reply.code, reply.message_text()));
    }

    // The rspauth step carries nothing for SMTP; acknowledge with an empty line.
    session.send("")?;
    session.receive()
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
    use super::super::authenticate;
    use super::super::testing::ScriptedSession;
    use super::*;

    const CHALLENGE: &str = "realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",\
                             qop=\"auth\",algorithm=md5-sess,charset=utf-8";

    fn rfc_response(qop: &str) -> DigestResponse<'_> {
        DigestResponse {
            username: "chris",
            realm: "elwood.innosoft.com",
            nonce: "OA6MG9tEQGm2hh",
            cnonce: "OA6MHXh6VqTrRk",
            qop,
            digest_uri: "imap/elwood.innosoft.com".to_string(),
            maxbuf: 65536,
        }
    }

    fn decode_token(token: &str) -> HashMap<String, String> {
        let raw = String::from_utf8(STANDARD.decode(token).unwrap()).unwrap();
        attributes(&raw).into_iter().collect()
    }

    #[test]
    fn test_parse_challenge() {
        let challenge = DigestChallenge::parse(CHALLENGE).unwrap();
        assert_eq!(challenge.nonce, "OA6MG9tEQGm2hh");
        assert_eq!(challenge.realm, "elwood.innosoft.com");
        assert_eq!(challenge.algorithm, "md5-sess");
        assert_eq!(challenge.qop, vec!["auth"]);
        assert_eq!(challenge.maxbuf, 65536);
    }

    #[test]
    fn test_parse_defaults_and_lists() {
        let challenge =
            DigestChallenge::parse("nonce=abc, algorithm=md5-sess, qop=\"auth,auth-int\", maxbuf=4096, opaque=\"x\"")
                .unwrap();
        assert_eq!(challenge.realm, "");
        assert_eq!(challenge.qop, vec!["auth", "auth-int"]);
        assert_eq!(challenge.maxbuf, 4096);
        assert!(challenge.offers_auth());

        let challenge = DigestChallenge::parse("nonce=abc,algorithm=md5-sess").unwrap();
        assert_eq!(challenge.qop, vec!["auth"]);
    }

    #[test]
    fn test_parse_escaped_quote() {
        let challenge =
            DigestChallenge::parse(r#"realm="a\"b",nonce="n",algorithm=md5-sess"#).unwrap();
        assert_eq!(challenge.realm, "a\"b");
    }

    #[test]
    fn test_parse_requires_nonce_and_algorithm() {
        assert!(matches!(
            DigestChallenge::parse("realm=\"x\",algorithm=md5-sess"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            DigestChallenge::parse("realm=\"x\",nonce=\"abc\""),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_rfc2831_response_value() {
        assert_eq!(
            rfc_response("auth").response_value("secret"),
            "d388dad90d4bbd760a152321f2143af7"
        );
    }

    #[test]
    fn test_non_auth_qop_pads_a2() {
        assert_eq!(
            rfc_response("auth-int").response_value("secret"),
            "c4aa29a1ed3d766c31d297e547fc2fb9"
        );
    }

    #[test]
    fn test_token_field_order() {
        let token = rfc_response("auth").to_token("secret");
        assert_eq!(
            token,
            "username=\"chris\",realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",\
             cnonce=\"OA6MHXh6VqTrRk\",nc=\"00000001\",qop=\"auth\",\
             digest-uri=\"imap/elwood.innosoft.com\",maxbuf=\"65536\",\
             response=\"d388dad90d4bbd760a152321f2143af7\""
        );
    }

    #[test]
    fn test_exchange() {
        let challenge = STANDARD.encode(format!("{CHALLENGE},maxbuf=1024"));
        let mut session = ScriptedSession::new(&[
            (334, challenge.as_str()),
            (334, "cnNwYXV0aD0xMjM0"),
            (235, "ok"),
        ]);
        let credentials = Credentials::new("chris", "secret");

        let mechanism = authenticate(&mut session, "DIGEST-MD5 PLAIN", &credentials).unwrap();
        assert_eq!(mechanism, AuthMechanism::DigestMd5);
        assert_eq!(session.max_buffer, 1024);
        assert_eq!(session.sent.len(), 3);
        assert_eq!(session.sent[0], "AUTH DIGEST-MD5");
        assert_eq!(session.sent[2], "");

        let fields = decode_token(&session.sent[1]);
        assert_eq!(fields["username"], "chris");
        assert_eq!(fields["realm"], "elwood.innosoft.com");
        assert_eq!(fields["nc"], "00000001");
        assert_eq!(fields["qop"], "auth");
        assert_eq!(fields["digest-uri"], "smtp/mail.example.com");
        assert_eq!(fields["maxbuf"], "1024");
        assert_eq!(fields["cnonce"].len(), 32);

        let expected = DigestResponse {
            username: "chris",
            realm: "elwood.innosoft.com",
            nonce: "OA6MG9tEQGm2hh",
            cnonce: &fields["cnonce"],
            qop: "auth",
            digest_uri: "smtp/mail.example.com".to_string(),
            maxbuf: 1024,
        }
        .response_value("secret");
        assert_eq!(fields["response"], expected);
    }

    #[test]
    fn test_fresh_cnonce_per_attempt() {
        let challenge = STANDARD.encode(CHALLENGE);
        let script = [(334, challenge.as_str()), (535, "no")];
        let credentials = Credentials::new("chris", "secret");

        let mut first = ScriptedSession::new(&script);
        let mut second = ScriptedSession::new(&script);
        let _ = authenticate(&mut first, "DIGEST-MD5", &credentials);
        let _ = authenticate(&mut second, "DIGEST-MD5", &credentials);

        assert_ne!(
            decode_token(&first.sent[1])["cnonce"],
            decode_token(&second.sent[1])["cnonce"]
        );
    }

    #[test]
    fn test_rejected_digest() {
        let challenge = STANDARD.encode(CHALLENGE);
        let mut session = ScriptedSession::new(&[(334, challenge.as_str()), (535, "bad")]);
        let err = authenticate(&mut session, "DIGEST-MD5", &Credentials::new("chris", "wrong"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::AuthFailed {
                mechanism: "DIGEST-MD5",
                ..
            }
        ));
        assert_eq!(session.sent.len(), 2);
    }

    #[test]
    fn test_qop_without_auth_is_refused() {
        let challenge = STANDARD.encode("nonce=abc,algorithm=md5-sess,qop=\"auth-conf\"");
        let mut session = ScriptedSession::new(&[(334, challenge.as_str())]);
        let err = authenticate(&mut session, "DIGEST-MD5", &Credentials::new("a", "b")).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(session.sent.len(), 1);
    }
}
