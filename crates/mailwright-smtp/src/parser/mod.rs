//! SMTP response parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses an SMTP reply from response lines (without line terminators).
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK`
/// - Multi: `250-First line`, `250-Second line`, `250 Last line`
///
/// The code is taken from the last line. Each line contributes its text
/// after the fourth character, trimmed. No lines at all yields
/// [`Reply::none`].
///
/// # Errors
///
/// Returns an error if the last line does not start with a three-digit code.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(last) = lines.last() else {
        return Ok(Reply::none());
    };

    let code = parse_code(last)?;
    let message = lines
        .iter()
        .map(|line| line.get(4..).unwrap_or("").trim().to_string())
        .collect();

    Ok(Reply::new(code, message))
}

fn parse_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .get(..3)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("Invalid reply line: {line:?}")))?;

    digits
        .parse::<i16>()
        .map(ReplyCode::new)
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {digits}")))
}

/// Checks if a line is the last line of a reply.
///
/// Continuation lines carry `-` as the fourth character. Anything else,
/// including a line too short to have a fourth character, ends the reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.as_bytes().get(3) != Some(&b'-')
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

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_single_line_reply() {
        let reply = parse_reply(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, vec!["OK"]);
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let reply = parse_reply(&lines(&["250-foo", "250 bar"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message_text(), "foo\r\nbar");
    }

    #[test]
    fn test_code_comes_from_last_line() {
        let reply = parse_reply(&lines(&["250-first", "421 going away"])).unwrap();
        assert_eq!(reply.code, ReplyCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_text_is_trimmed() {
        let reply = parse_reply(&lines(&["220   smtp.example.com ESMTP  "])).unwrap();
        assert_eq!(reply.message, vec!["smtp.example.com ESMTP"]);
    }

    #[test]
    fn test_bare_code() {
        let reply = parse_reply(&lines(&["354"])).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_empty_is_none() {
        let reply = parse_reply(&[]).unwrap();
        assert_eq!(reply.code, ReplyCode::NONE);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(is_last_reply_line("250"));
    }

    #[test]
    fn test_parse_error_too_short() {
        assert!(parse_reply(&lines(&["25"])).is_err());
    }

    #[test]
    fn test_parse_error_invalid_code() {
        assert!(parse_reply(&lines(&["ABC OK"])).is_err());
        assert!(parse_reply(&lines(&["-25 OK"])).is_err());
    }
}
