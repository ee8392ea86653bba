//! Stateless encoding helpers for outgoing messages.
//!
//! Everything here is a pure function over strings so each transform can be
//! tested on its own and shared between transports:
//!
//! - RFC 2047 encoded-words for non-ASCII header values
//! - header value sanitization (no CR, LF or NUL survives)
//! - address decoding and sanitization
//! - CRLF normalization, dot-stuffing and UTF-8 aware line wrapping

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Column at which body text and base64 payloads are wrapped.
pub const LINE_WIDTH: usize = 72;

/// Line terminator used on the wire.
pub const CRLF: &str = "\r\n";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes a header value as an RFC 2047 encoded-word when needed.
///
/// Values made only of 7-bit ASCII are returned unchanged. Anything else
/// becomes `=?UTF-8?B?<base64>?=`.
#[must_use]
pub fn encode_header_word(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }

    format!("=?UTF-8?B?{}?=", encode_base64(text.as_bytes()))
}

/// Strips CR, LF and NUL from a header value.
///
/// Applied to every header value before serialization so caller supplied
/// text can never start a new header line.
#[must_use]
pub fn sanitize_header_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
        .collect()
}

/// Removes every character that may not appear in an e-mail address.
///
/// Letters, digits and ``!#$%&'*+-=?^_`{|}~@.[]`` are kept.
#[must_use]
pub fn sanitize_address(address: &str) -> String {
    address
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-=?^_`{|}~@.[]".contains(*c))
        .collect()
}

/// Splits `Display Name <addr>` into its parts.
///
/// The display name is trimmed and loses any surrounding double quotes; the
/// address is sanitized. Input without an angle-bracket address is taken as
/// a bare address with no display name.
#[must_use]
pub fn decode_address(input: &str) -> (Option<String>, String) {
    if let Some(without_close) = input.strip_suffix('>')
        && let Some(open) = without_close.rfind('<')
    {
        let (name, address) = (&without_close[..open], &without_close[open + 1..]);
        if !name.is_empty() && !address.is_empty() {
            let name = name.trim();
            let name = name
                .strip_prefix('"')
                .and_then(|n| n.strip_suffix('"'))
                .unwrap_or(name)
                .trim();
            let name = (!name.is_empty()).then(|| name.to_string());
            return (name, sanitize_address(address));
        }
    }

    (None, sanitize_address(input))
}

/// Renders a mailbox for an address header.
///
/// A display name is quoted and RFC 2047 encoded if needed; without one the
/// bare address is returned.
#[must_use]
pub fn format_mailbox(name: Option<&str>, address: &str) -> String {
    match name {
        Some(name) => format!("\"{}\" <{address}>", encode_header_word(name)),
        None => address.to_string(),
    }
}

/// Converts bare `\n` and bare `\r` into `\r\n`.
///
/// Existing `\r\n` pairs are left alone.
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 16);
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                result.push_str(CRLF);
            }
            '\n' => result.push_str(CRLF),
            _ => result.push(ch),
        }
    }

    result
}

/// Doubles every line-leading `.` so it cannot end the DATA section.
///
/// Expects CRLF-normalized input.
#[must_use]
pub fn dot_stuff(text: &str) -> String {
    let stuffed = text.replace("\r\n.", "\r\n..");
    if stuffed.starts_with('.') {
        format!(".{stuffed}")
    } else {
        stuffed
    }
}

/// Wraps text at `width` columns, breaking on spaces with CRLF.
///
/// Width is counted in characters, not bytes, so multibyte sequences are
/// never split. Words longer than `width` are left intact. Existing CRLF
/// breaks restart the column count.
#[must_use]
pub fn wrap_text(text: &str, width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let brk: Vec<char> = CRLF.chars().collect();
    let mut result = String::with_capacity(text.len() + text.len() / width.max(1) * 2);

    let mut last_start = 0;
    let mut last_space = 0;
    let mut current = 0;

    while current < chars.len() {
        let ch = chars[current];

        if chars[current..].starts_with(&brk) {
            result.extend(&chars[last_start..current + brk.len()]);
            current += brk.len();
            last_start = current;
            last_space = current;
            continue;
        }

        if ch == ' ' {
            if current - last_start >= width {
                result.extend(&chars[last_start..current]);
                result.push_str(CRLF);
                last_start = current + 1;
            }
            last_space = current;
        } else if current - last_start >= width && last_start < last_space {
            result.extend(&chars[last_start..last_space]);
            result.push_str(CRLF);
            last_space += 1;
            last_start = last_space;
        }

        current += 1;
    }

    if last_start < chars.len() {
        result.extend(&chars[last_start..]);
    }

    result
}

/// Hard-wraps an ASCII payload (e.g. base64) every `width` bytes.
#[must_use]
pub fn wrap_ascii(encoded: &str, width: usize) -> String {
    encoded
        .as_bytes()
        .chunks(width.max(1))
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(CRLF)
}

/// Turns a raw message body into its SMTP-safe wire form.
///
/// Line endings are normalized, text is wrapped at [`LINE_WIDTH`] and
/// line-leading dots are stuffed last so wrapping cannot expose an
/// unstuffed dot.
#[must_use]
pub fn prepare_body(raw: &str) -> String {
    let normalized = normalize_line_endings(raw);
    let wrapped = wrap_text(&normalized, LINE_WIDTH);
    dot_stuff(&wrapped)
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
    use proptest::prelude::*;

    fn decode_word(word: &str) -> Vec<u8> {
        let inner = word
            .strip_prefix("=?UTF-8?B?")
            .and_then(|w| w.strip_suffix("?="))
            .unwrap();
        STANDARD.decode(inner).unwrap()
    }

    #[test]
    fn test_header_word_ascii_passthrough() {
        assert_eq!(encode_header_word("Hello world"), "Hello world");
        assert_eq!(encode_header_word(""), "");
    }

    #[test]
    fn test_header_word_non_ascii() {
        let encoded = encode_header_word("héllo");
        assert_eq!(encoded, "=?UTF-8?B?aMOpbGxv?=");
        assert_eq!(decode_word(&encoded), "héllo".as_bytes());
    }

    #[test]
    fn test_sanitize_header_value() {
        assert_eq!(
            sanitize_header_value("Subject\r\nBcc: victim@example.com\0"),
            "SubjectBcc: victim@example.com"
        );
    }

    #[test]
    fn test_sanitize_address() {
        assert_eq!(sanitize_address(" user (x)@example.com\r\n"), "userx@example.com");
        assert_eq!(sanitize_address("a+tag@[127.0.0.1]"), "a+tag@[127.0.0.1]");
    }

    #[test]
    fn test_decode_address_with_name() {
        let (name, addr) = decode_address("John Doe <john@example.com>");
        assert_eq!(name.as_deref(), Some("John Doe"));
        assert_eq!(addr, "john@example.com");
    }

    #[test]
    fn test_decode_address_quoted_name() {
        let (name, addr) = decode_address("\"Doe, John\" <john@example.com>");
        assert_eq!(name.as_deref(), Some("Doe, John"));
        assert_eq!(addr, "john@example.com");
    }

    #[test]
    fn test_decode_address_bare() {
        let (name, addr) = decode_address("john@example.com");
        assert!(name.is_none());
        assert_eq!(addr, "john@example.com");
    }

    #[test]
    fn test_decode_address_no_name_before_bracket() {
        let (name, addr) = decode_address("<john@example.com>");
        assert!(name.is_none());
        assert_eq!(addr, "john@example.com");
    }

    #[test]
    fn test_format_mailbox() {
        assert_eq!(format_mailbox(None, "a@x.com"), "a@x.com");
        assert_eq!(format_mailbox(Some("Ann"), "a@x.com"), "\"Ann\" <a@x.com>");
        assert_eq!(
            format_mailbox(Some("Zoë"), "z@x.com"),
            "\"=?UTF-8?B?Wm/Dqw==?=\" <z@x.com>"
        );
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\nb\rc\r\nd"), "a\r\nb\r\nc\r\nd");
        assert_eq!(normalize_line_endings("\r\n\r\n"), "\r\n\r\n");
        assert_eq!(normalize_line_endings("\n\r"), "\r\n\r\n");
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff("\r\n.foo"), "\r\n..foo");
        assert_eq!(dot_stuff(".foo"), "..foo");
        assert_eq!(dot_stuff("a.b\r\nc"), "a.b\r\nc");
        assert_eq!(dot_stuff("\r\n..x"), "\r\n...x");
    }

    #[test]
    fn test_prepare_body_example() {
        assert_eq!(prepare_body("Hi.\n.\n"), "Hi.\r\n..\r\n");
    }

    #[test]
    fn test_wrap_short_text_unchanged() {
        assert_eq!(wrap_text("short line", 72), "short line");
    }

    #[test]
    fn test_wrap_breaks_on_space() {
        assert_eq!(wrap_text("aaaa bbbb cccc", 9), "aaaa bbbb\r\ncccc");
        assert_eq!(wrap_text("aaaa bbbb cccc", 5), "aaaa\r\nbbbb\r\ncccc");
    }

    #[test]
    fn test_wrap_keeps_long_words() {
        assert_eq!(wrap_text("abcdefghij xy", 4), "abcdefghij\r\nxy");
    }

    #[test]
    fn test_wrap_counts_characters() {
        // Ten two-byte characters fit in a width of ten.
        let text = "éééééééééé ü";
        assert_eq!(wrap_text(text, 10), "éééééééééé\r\nü");
    }

    #[test]
    fn test_wrap_resets_on_existing_breaks() {
        assert_eq!(wrap_text("aaaa\r\nbbbb cc", 6), "aaaa\r\nbbbb\r\ncc");
    }

    #[test]
    fn test_prepare_body_stuffs_wrapped_dots() {
        let body = format!("{} .hidden", "x".repeat(72));
        assert_eq!(prepare_body(&body), format!("{}\r\n..hidden", "x".repeat(72)));
    }

    #[test]
    fn test_wrap_ascii() {
        assert_eq!(wrap_ascii("abcdefg", 3), "abc\r\ndef\r\ng");
        assert_eq!(wrap_ascii("abc", 3), "abc");
        assert_eq!(wrap_ascii("", 3), "");
    }

    proptest! {
        #[test]
        fn prop_ascii_header_word_is_identity(s in "[ -~]*") {
            prop_assert_eq!(encode_header_word(&s), s);
        }

        #[test]
        fn prop_non_ascii_header_word_round_trips(s in ".*[^\\x00-\\x7F].*") {
            let encoded = encode_header_word(&s);
            prop_assert_eq!(decode_word(&encoded), s.as_bytes().to_vec());
        }

        #[test]
        fn prop_sanitize_strips_and_is_idempotent(s in any::<String>()) {
            let once = sanitize_header_value(&s);
            prop_assert!(!once.contains(['\r', '\n', '\0']));
            prop_assert_eq!(sanitize_header_value(&once), once);
        }

        #[test]
        fn prop_normalized_text_has_only_crlf(s in any::<String>()) {
            let normalized = normalize_line_endings(&s);
            let stripped = normalized.replace("\r\n", "");
            prop_assert!(!stripped.contains(['\r', '\n']));
            prop_assert_eq!(normalize_line_endings(&normalized), normalized);
        }

        #[test]
        fn prop_prepared_body_has_no_bare_dot_line(s in any::<String>()) {
            let body = prepare_body(&s);
            prop_assert!(!body.split("\r\n").any(|line| line == "."));
        }
    }
}
