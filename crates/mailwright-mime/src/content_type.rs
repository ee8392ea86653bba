//! MIME content type handling.

use std::fmt;
use std::path::Path;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "pdf", "mixed").
    pub sub_type: String,
    /// Parameters in output order (e.g., charset, boundary).
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a text/plain content type in UTF-8.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a multipart/mixed content type with boundary.
    #[must_use]
    pub fn multipart_mixed(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "mixed").with_parameter("boundary", boundary)
    }

    /// Guesses the content type of a file from its extension.
    ///
    /// Unknown extensions map to `application/octet-stream`.
    #[must_use]
    pub fn guess_from_path(path: &Path) -> Self {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        Self::new(mime.type_().as_str(), mime.subtype().as_str())
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        for (key, value) in &self.parameters {
            write!(f, "; {key}=\"{value}\"")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_plain() {
        let ct = ContentType::text_plain();
        assert_eq!(ct.to_string(), "text/plain; charset=\"utf-8\"");
        assert_eq!(ct.essence(), "text/plain");
    }

    #[test]
    fn test_multipart_mixed() {
        let ct = ContentType::multipart_mixed("b123");
        assert_eq!(ct.essence(), "multipart/mixed");
        assert_eq!(ct.parameters, vec![("boundary".to_string(), "b123".to_string())]);
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"b123\"");
    }

    #[test]
    fn test_guess_from_path() {
        assert_eq!(
            ContentType::guess_from_path(Path::new("report.pdf")).essence(),
            "application/pdf"
        );
        assert_eq!(
            ContentType::guess_from_path(Path::new("notes.txt")).essence(),
            "text/plain"
        );
        assert_eq!(
            ContentType::guess_from_path(Path::new("blob.unknownext")).to_string(),
            "application/octet-stream"
        );
    }
}
