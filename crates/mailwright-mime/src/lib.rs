//! # mailwright-mime
//!
//! Composition of outgoing plain-text email with optional file attachments.
//!
//! ## Features
//!
//! - **Email builder**: Subject, body, Reply-To, custom headers and recipients
//! - **Attachments**: Lazily read files, 10 MiB cumulative cap, base64 parts
//! - **Encoding**: RFC 2047 header words, header sanitizing, body wrapping and
//!   dot-stuffing
//! - **Transport contract**: Any [`Transport`] can deliver a composed message
//!
//! ## Quick Start
//!
//! ```
//! use mailwright_mime::{Email, MockTransport};
//!
//! let mut transport = MockTransport::new();
//!
//! Email::new("Ann <ann@example.com>", &mut transport)
//!     .subject("Weekly report")
//!     .body("Numbers are up.\n")
//!     .send(&["bob@example.com"], &[], &["audit@example.com"])
//!     .unwrap();
//!
//! let sent = transport.last().unwrap();
//! assert_eq!(sent.recipients.len(), 2);
//! assert!(sent.headers.get("Bcc").is_some());
//! ```
//!
//! ### Attachments
//!
//! ```ignore
//! use mailwright_mime::Email;
//!
//! let email = Email::new("ann@example.com", &mut transport)
//!     .subject("Invoice")
//!     .body("See attached.")
//!     .attach("invoice.pdf")?;
//!
//! email.send(&["bob@example.com"], &[], &[])?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod content_type;
mod email;
mod error;
mod header;
mod transport;

pub mod encoding;
pub mod multipart;

pub use attachment::{ATTACHMENT_LIMIT, Attachment};
pub use content_type::ContentType;
pub use email::{Email, MAILER_TAG};
pub use error::{Error, Result};
pub use header::Headers;
pub use transport::{MockTransport, OutgoingMessage, Transport};
