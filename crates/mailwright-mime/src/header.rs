//! Ordered header collection.

use crate::encoding::{CRLF, sanitize_header_value};
use std::fmt;

/// Ordered collection of message headers.
///
/// Names are matched case-insensitively but stored as given. Insertion order
/// is the wire order. Values are sanitized when serialized, names are not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header value.
    ///
    /// An existing header with the same name keeps its position and gets the
    /// new value; otherwise the header is appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Gets the value of a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes a header, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    /// Returns the number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Sanitizes every value in place.
    pub fn sanitize(&mut self) {
        for (_, value) in &mut self.entries {
            *value = sanitize_header_value(value);
        }
    }

    /// Serializes the headers as `Name: value\r\n` lines.
    ///
    /// Values are sanitized on the way out. No blank separator line is
    /// appended.
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {}{CRLF}", sanitize_header_value(value))?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
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

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
        assert_eq!(headers.to_wire(), "");
    }

    #[test]
    fn test_headers_set_get() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_set_keeps_position() {
        let mut headers = Headers::new();
        headers.set("From", "a@x.com");
        headers.set("Subject", "first");
        headers.set("To", "b@x.com");
        headers.set("subject", "second");

        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["From", "Subject", "To"]);
        assert_eq!(headers.get("Subject"), Some("second"));
    }

    #[test]
    fn test_headers_remove_then_set_moves_to_end() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        headers.set("X-Mailer", "test");
        assert_eq!(headers.remove("content-type").as_deref(), Some("text/plain"));
        headers.set("Content-Type", "multipart/mixed");

        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["X-Mailer", "Content-Type"]);
    }

    #[test]
    fn test_headers_remove_missing() {
        let mut headers = Headers::new();
        assert!(headers.remove("Bcc").is_none());
    }

    #[test]
    fn test_headers_wire_sanitizes_values_only() {
        let mut headers = Headers::new();
        headers.set("Subject", "Hi\r\nBcc: evil@example.com");
        headers.set("X-Test", "a\0b");
        assert_eq!(
            headers.to_wire(),
            "Subject: HiBcc: evil@example.com\r\nX-Test: ab\r\n"
        );
    }

    #[test]
    fn test_headers_sanitize_in_place() {
        let mut headers: Headers = [("Subject", "a\nb")].into_iter().collect();
        headers.sanitize();
        assert_eq!(headers.get("Subject"), Some("ab"));
    }
}
