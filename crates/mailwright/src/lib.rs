//! # mailwright
//!
//! Lightweight email composition and delivery.
//!
//! A [`Mailer`] is loaded from a [`TransportConfig`] and a sender address. It
//! hands out [`Email`] builders that deliver through the selected transport:
//! an SMTP session ([`mailwright_smtp`]) or an in-memory recorder for tests.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwright::{Mailer, Security, SmtpConfig, TransportConfig};
//!
//! let config = SmtpConfig::builder("smtp.example.com")
//!     .port(587)
//!     .security(Security::StartTls)
//!     .credentials("forum@example.com", "secret")
//!     .build();
//!
//! let mut mailer = Mailer::load(&TransportConfig::Smtp(config), "Forum <forum@example.com>")?;
//! mailer
//!     .new_email(Some("Password reset"), Some("Follow the link below."))
//!     .attach("terms.pdf")?
//!     .send(&["member@example.com"], &[], &[])?;
//! mailer.close();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod mailer;

pub use error::{Error, Result};
pub use mailer::{MailTransport, Mailer, TransportConfig};

pub use mailwright_mime::{Attachment, Email, Headers, MockTransport, OutgoingMessage, Transport};
pub use mailwright_smtp::{Credentials, Security, SmtpConfig, SmtpConfigBuilder, SmtpTransport};
