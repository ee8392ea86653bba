//! SMTP extension types.

use std::collections::BTreeMap;

/// A single EHLO extension line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// Verb without argument (e.g. `STARTTLS`).
    Present,
    /// Verb with argument (e.g. `SIZE 35000000`).
    Argument(String),
}

impl Extension {
    /// Parses an extension line into its uppercased verb and value.
    #[must_use]
    pub fn parse(line: &str) -> Option<(String, Self)> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let ext = match line.split_once(' ') {
            Some((verb, arg)) => (verb.to_uppercase(), Self::Argument(arg.trim().to_string())),
            None => (line.to_uppercase(), Self::Present),
        };
        Some(ext)
    }

    /// Returns the argument, if any.
    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        match self {
            Self::Present => None,
            Self::Argument(arg) => Some(arg),
        }
    }
}

/// Extensions advertised in an EHLO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerExtensions {
    entries: BTreeMap<String, Extension>,
}

impl ServerExtensions {
    /// Builds the extension set from EHLO reply lines.
    ///
    /// The first line is the server greeting and is skipped.
    #[must_use]
    pub fn from_ehlo(lines: &[String]) -> Self {
        let entries = lines
            .iter()
            .skip(1)
            .filter_map(|line| Extension::parse(line))
            .collect();
        Self { entries }
    }

    /// Returns the extension advertised under `verb`.
    #[must_use]
    pub fn get(&self, verb: &str) -> Option<&Extension> {
        self.entries.get(&verb.to_uppercase())
    }

    /// Checks if the server advertised `verb`.
    #[must_use]
    pub fn supports(&self, verb: &str) -> bool {
        self.get(verb).is_some()
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports("STARTTLS")
    }

    /// Returns the AUTH argument (space-separated mechanism list).
    #[must_use]
    pub fn auth_mechanisms(&self) -> &str {
        self.get("AUTH").and_then(Extension::argument).unwrap_or("")
    }

    /// Returns the maximum message size, if advertised and non-zero.
    #[must_use]
    pub fn max_size(&self) -> Option<usize> {
        self.get("SIZE")
            .and_then(Extension::argument)
            .and_then(|size| size.parse().ok())
            .filter(|size| *size > 0)
    }

    /// Returns the number of advertised extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the advertised verbs.
    pub fn verbs(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
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

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parse_present() {
        assert_eq!(
            Extension::parse("starttls"),
            Some(("STARTTLS".to_string(), Extension::Present))
        );
    }

    #[test]
    fn parse_argument() {
        assert_eq!(
            Extension::parse("AUTH LOGIN PLAIN"),
            Some((
                "AUTH".to_string(),
                Extension::Argument("LOGIN PLAIN".to_string())
            ))
        );
    }

    #[test]
    fn parse_empty() {
        assert_eq!(Extension::parse("  "), None);
    }

    #[test]
    fn from_ehlo_skips_greeting() {
        let ext = ServerExtensions::from_ehlo(&lines(&[
            "mx.example.com Hello",
            "PIPELINING",
            "SIZE 35000000",
            "auth LOGIN PLAIN",
            "STARTTLS",
        ]));

        assert_eq!(ext.len(), 4);
        assert!(!ext.supports("MX.EXAMPLE.COM"));
        assert!(ext.supports("pipelining"));
        assert!(ext.supports_starttls());
        assert_eq!(ext.auth_mechanisms(), "LOGIN PLAIN");
        assert_eq!(ext.max_size(), Some(35_000_000));
    }

    #[test]
    fn helo_reply_has_no_extensions() {
        let ext = ServerExtensions::from_ehlo(&lines(&["mx.example.com"]));
        assert!(ext.is_empty());
        assert!(!ext.supports_starttls());
        assert_eq!(ext.auth_mechanisms(), "");
        assert_eq!(ext.max_size(), None);
    }

    #[test]
    fn zero_or_bare_size_is_ignored() {
        let ext = ServerExtensions::from_ehlo(&lines(&["hi", "SIZE 0"]));
        assert_eq!(ext.max_size(), None);
        let ext = ServerExtensions::from_ehlo(&lines(&["hi", "SIZE"]));
        assert_eq!(ext.max_size(), None);
    }
}
