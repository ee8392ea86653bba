//! Core SMTP types.

mod extension;
mod reply;

pub use extension::{Extension, ServerExtensions};
pub use reply::{Reply, ReplyCode};
