//! CRAM-MD5 (RFC 2195).

use super::{AuthMechanism, AuthSession, begin, decode_challenge};
use crate::connection::Credentials;
use crate::error::{Error, Result};
use crate::types::Reply;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;

type HmacMd5 = Hmac<Md5>;

pub(super) fn exchange<S: AuthSession + ?Sized>(
    session: &mut S,
    credentials: &Credentials,
) -> Result<Reply> {
    let challenge = decode_challenge(&begin(session, AuthMechanism::CramMd5)?)?;
    let token = response(&credentials.username, &credentials.password, &challenge)?;
    session.send_credentials(&STANDARD.encode(token))?;
    session.receive()
}

/// Returns `username <hex HMAC-MD5(password, challenge)>`.
fn response(username: &str, password: &str, challenge: &[u8]) -> Result<String> {
    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|e| Error::Protocol(format!("CRAM-MD5 key rejected: {e}")))?;
    mac.update(challenge);
    Ok(format!(
        "{username} {}",
        hex::encode(mac.finalize().into_bytes())
    ))
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
    use super::super::testing::ScriptedSession;
    use super::super::authenticate;
    use super::*;

    const CHALLENGE: &[u8] = b"<1896.697170952@postoffice.reston.mci.net>";

    #[test]
    fn test_rfc2195_vector() {
        let token = response("tim", "tanstaaftanstaaf", CHALLENGE).unwrap();
        assert_eq!(token, "tim b913a602c7eda7a495b4e6e7334d3890");
    }

    #[test]
    fn test_exchange() {
        let challenge = STANDARD.encode(CHALLENGE);
        let mut session = ScriptedSession::new(&[(334, challenge.as_str()), (235, "ok")]);
        let credentials = Credentials::new("tim", "tanstaaftanstaaf");

        let mechanism = authenticate(&mut session, "PLAIN CRAM-MD5", &credentials).unwrap();
        assert_eq!(mechanism, AuthMechanism::CramMd5);
        assert_eq!(
            session.sent,
            vec![
                "AUTH CRAM-MD5",
                "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw"
            ]
        );
    }

    #[test]
    fn test_invalid_challenge() {
        let mut session = ScriptedSession::new(&[(334, "not base64!")]);
        let err = authenticate(&mut session, "CRAM-MD5", &Credentials::new("a", "b")).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
