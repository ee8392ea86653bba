//! multipart/mixed assembly for messages with attachments.

use crate::attachment::Attachment;
use crate::content_type::ContentType;
use crate::encoding::{CRLF, LINE_WIDTH, encode_base64, encode_header_word, wrap_ascii};
use crate::header::Headers;
use std::fmt::Write as _;

const DEFAULT_BODY_TYPE: &str = "text/plain; charset=\"utf-8\"";
const DEFAULT_BODY_ENCODING: &str = "8bit";

/// Generates a boundary token that does not occur in `body`.
#[must_use]
pub fn generate_boundary(body: &str) -> String {
    loop {
        let boundary = format!("=_Part_{}", uuid::Uuid::new_v4().simple());
        if !body.contains(&boundary) {
            return boundary;
        }
    }
}

/// Wraps `body` and `attachments` into a multipart/mixed body.
///
/// The body keeps the `Content-Type` and `Content-Transfer-Encoding` it had
/// in `headers`; those are then replaced by the multipart type and an inline
/// disposition. Attachments that can no longer be read are skipped.
///
/// Returns the new message body. `headers` is left untouched when there are
/// no attachments.
pub fn assemble(headers: &mut Headers, body: &str, attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return body.to_string();
    }

    let boundary = generate_boundary(body);
    let body_type = headers
        .remove("Content-Type")
        .unwrap_or_else(|| DEFAULT_BODY_TYPE.to_string());
    let body_encoding = headers
        .remove("Content-Transfer-Encoding")
        .unwrap_or_else(|| DEFAULT_BODY_ENCODING.to_string());

    let mut part_headers = Headers::new();
    part_headers.set("Content-Type", body_type);
    part_headers.set("Content-Transfer-Encoding", body_encoding);

    let mut data = format!("--{boundary}{CRLF}{part_headers}{CRLF}{body}{CRLF}");

    let mut included = 0usize;
    for attachment in attachments {
        let content = match attachment.read() {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    path = %attachment.path().display(),
                    error = %e,
                    "Skipping unreadable attachment"
                );
                continue;
            }
        };

        let filename = encode_header_word(&attachment.name().replace('"', ""));
        let mut part_headers = Headers::new();
        part_headers.set("Content-Type", attachment.content_type().essence());
        part_headers.set("Content-Transfer-Encoding", "base64");
        part_headers.set(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        );

        let encoded = wrap_ascii(&encode_base64(&content), LINE_WIDTH);
        let _ = write!(data, "--{boundary}{CRLF}{part_headers}{CRLF}{encoded}{CRLF}");
        included += 1;
    }

    let _ = write!(data, "--{boundary}--");

    tracing::debug!(
        %boundary,
        attachments = included,
        skipped = attachments.len() - included,
        "Assembled multipart/mixed body"
    );

    headers.set(
        "Content-Type",
        ContentType::multipart_mixed(boundary).to_string(),
    );
    headers.set("Content-Disposition", "inline");

    data
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
    use std::fs;

    fn base_headers() -> Headers {
        [
            ("MIME-Version", "1.0"),
            ("Content-Transfer-Encoding", "8bit"),
            ("Content-Type", "text/plain; charset=\"utf-8\""),
            ("X-Mailer", "test"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_boundary_is_fresh_per_call() {
        let boundary = generate_boundary("anything");
        assert!(boundary.starts_with("=_Part_"));
        assert_ne!(generate_boundary(""), boundary);
    }

    #[test]
    fn test_no_attachments_is_passthrough() {
        let mut headers = base_headers();
        let body = assemble(&mut headers, "Hello\r\n", &[]);
        assert_eq!(body, "Hello\r\n");
        assert_eq!(headers, base_headers());
    }

    #[test]
    fn test_assemble_single_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, "hello world").unwrap();
        let attachment = Attachment::from_path(&path).unwrap();

        let mut headers = base_headers();
        let body = assemble(&mut headers, "Body text", &[attachment]);

        let ct = headers.get("Content-Type").unwrap().to_string();
        let boundary = ct
            .strip_prefix("multipart/mixed; boundary=\"")
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap();
        assert_eq!(headers.get("Content-Disposition"), Some("inline"));
        assert!(headers.get("Content-Transfer-Encoding").is_none());

        let expected = format!(
            "--{boundary}\r\n\
             Content-Type: text/plain; charset=\"utf-8\"\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             \r\n\
             Body text\r\n\
             --{boundary}\r\n\
             Content-Type: text/plain\r\n\
             Content-Transfer-Encoding: base64\r\n\
             Content-Disposition: attachment; filename=\"hello.txt\"\r\n\
             \r\n\
             aGVsbG8gd29ybGQ=\r\n\
             --{boundary}--"
        );
        assert_eq!(body, expected);
    }

    #[test]
    fn test_assemble_wraps_base64_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, vec![0xABu8; 200]).unwrap();
        let attachment = Attachment::from_path(&path).unwrap();

        let mut headers = base_headers();
        let body = assemble(&mut headers, "x", &[attachment]);

        let payload_lines: Vec<&str> = body
            .split("\r\n")
            .filter(|line| !line.is_empty() && !line.contains(':') && !line.starts_with("--"))
            .skip(1)
            .collect();
        assert!(payload_lines.iter().all(|line| line.len() <= LINE_WIDTH));
        assert_eq!(payload_lines.concat(), encode_base64(&[0xAB; 200]));
    }

    #[test]
    fn test_unreadable_attachment_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.txt");
        let gone = dir.path().join("gone.txt");
        fs::write(&kept, "kept").unwrap();
        fs::write(&gone, "gone").unwrap();
        let attachments = vec![
            Attachment::from_path(&gone).unwrap(),
            Attachment::from_path(&kept).unwrap(),
        ];
        fs::remove_file(&gone).unwrap();

        let mut headers = base_headers();
        let body = assemble(&mut headers, "x", &attachments);
        assert!(body.contains("filename=\"kept.txt\""));
        assert!(!body.contains("gone.txt"));
        assert!(headers.get("Content-Type").unwrap().starts_with("multipart/mixed"));
    }
}
