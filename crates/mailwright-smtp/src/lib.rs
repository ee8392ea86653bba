//! # mailwright-smtp
//!
//! A blocking SMTP client implementing the sending side of RFC 5321.
//!
//! ## Features
//!
//! - **Session handshake**: Greeting check, EHLO with HELO fallback
//! - **TLS support**: Implicit TLS (port 465) and opportunistic STARTTLS
//! - **Authentication**: DIGEST-MD5, CRAM-MD5, LOGIN, PLAIN, ANONYMOUS
//! - **Extensions**: SIZE limits the outbound payload
//! - **Transport**: Implements [`mailwright_mime::Transport`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwright_mime::Email;
//! use mailwright_smtp::{Security, SmtpConfig, SmtpTransport};
//!
//! fn main() -> mailwright_smtp::Result<()> {
//!     let config = SmtpConfig::builder("smtp.example.com")
//!         .port(587)
//!         .security(Security::StartTls)
//!         .credentials("user@example.com", "password")
//!         .build();
//!
//!     let mut smtp = SmtpTransport::connect(&config)?;
//!
//!     Email::new("Sender <sender@example.com>", &mut smtp)
//!         .subject("Test")
//!         .body("Hello, World!")
//!         .send(&["recipient@example.com"], &[], &[])?;
//!
//!     smtp.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Connecting ─→ Greeted ─→ Negotiated ─→ (TlsUpgraded ─→ Negotiated)?
//!                                              │
//!                         (Authenticated)? ←───┘
//!                                │
//!                              Ready ─→ InTransaction ─→ Idle ─→ … ─→ Closed
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: SASL mechanism selection and exchanges
//! - [`command`]: SMTP command lines
//! - [`connection`]: Line-oriented connection, configuration and session
//! - [`parser`]: Reply parser
//! - [`types`]: Replies and EHLO extensions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use auth::AuthMechanism;
pub use connection::{
    Connection, Credentials, Security, SessionState, SmtpConfig, SmtpConfigBuilder, SmtpTransport,
};
pub use error::{Error, Result};
pub use types::{Extension, Reply, ReplyCode, ServerExtensions};
