//! SMTP command builder.

use std::fmt;

/// SMTP command.
///
/// `Display` renders the command line without the trailing CRLF, which the
/// connection appends on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Mechanism name
        mechanism: &'static str,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: String,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: String,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// QUIT - Close connection
    Quit,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(f, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::Auth { mechanism } => write!(f, "AUTH {mechanism}"),
            Self::MailFrom { from } => write!(f, "MAIL FROM:<{from}>"),
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            Self::Data => f.write_str("DATA"),
            Self::Rset => f.write_str("RSET"),
            Self::Quit => f.write_str("QUIT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings() {
        let ehlo = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        let helo = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(ehlo.to_string(), "EHLO client.example.com");
        assert_eq!(helo.to_string(), "HELO client.example.com");
    }

    #[test]
    fn test_envelope_commands() {
        let mail = Command::MailFrom {
            from: "sender@example.com".to_string(),
        };
        let rcpt = Command::RcptTo {
            to: "recipient@example.com".to_string(),
        };
        assert_eq!(mail.to_string(), "MAIL FROM:<sender@example.com>");
        assert_eq!(rcpt.to_string(), "RCPT TO:<recipient@example.com>");
    }

    #[test]
    fn test_auth_command() {
        let cmd = Command::Auth {
            mechanism: "CRAM-MD5",
        };
        assert_eq!(cmd.to_string(), "AUTH CRAM-MD5");
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(Command::StartTls.to_string(), "STARTTLS");
        assert_eq!(Command::Data.to_string(), "DATA");
        assert_eq!(Command::Rset.to_string(), "RSET");
        assert_eq!(Command::Quit.to_string(), "QUIT");
    }
}
