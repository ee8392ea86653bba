//! Sends one message through an SMTP server.
//!
//! ```text
//! SMTP_HOST=smtp.example.com SMTP_USER=me@example.com SMTP_PASSWORD=secret \
//! MAIL_FROM="Me <me@example.com>" MAIL_TO=you@example.com \
//! RUST_LOG=mailwright_smtp=trace cargo run --example send_mail -- report.pdf
//! ```
//!
//! Optional: `SMTP_PORT` (defaults to 587), `SMTP_SECURITY` (`none`,
//! `starttls` or `implicit`).

use std::env;

use anyhow::{Context, bail};
use mailwright::{Mailer, Security, SmtpConfig, TransportConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailwright=debug,mailwright_smtp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = env::var("SMTP_HOST").context("SMTP_HOST is not set")?;
    let from = env::var("MAIL_FROM").context("MAIL_FROM is not set")?;
    let to = env::var("MAIL_TO").context("MAIL_TO is not set")?;

    let security = match env::var("SMTP_SECURITY").as_deref() {
        Ok("none") => Security::None,
        Ok("implicit") => Security::Implicit,
        Ok("starttls") | Err(_) => Security::StartTls,
        Ok(other) => bail!("unknown SMTP_SECURITY value: {other}"),
    };
    let port = match env::var("SMTP_PORT") {
        Ok(port) => port.parse().context("SMTP_PORT is not a port number")?,
        Err(_) if security.is_implicit() => security.default_port(),
        Err(_) => 587,
    };

    // Attachments travel inside the single DATA write, so leave room for
    // the base64 form of a full attachment allowance.
    let mut builder = SmtpConfig::builder(host)
        .port(port)
        .security(security)
        .max_buffer(16 * 1024 * 1024);
    if let (Ok(user), Ok(password)) = (env::var("SMTP_USER"), env::var("SMTP_PASSWORD")) {
        builder = builder.credentials(user, password);
    }

    let mut mailer = Mailer::load(&TransportConfig::Smtp(builder.build()), from)
        .context("could not open SMTP session")?;

    let mut email = mailer.new_email(
        Some("mailwright test message"),
        Some("This message was sent by the mailwright send_mail example.\n"),
    );
    for path in env::args().skip(1) {
        email = email
            .attach(&path)
            .with_context(|| format!("could not attach {path}"))?;
    }
    email.send(&[to.as_str()], &[], &[]).context("delivery failed")?;

    mailer.close();
    tracing::info!("Done");
    Ok(())
}
