pub mod client;
pub mod config;
pub mod message;

pub use client::MailDispatcher;
pub use config::SmtpConfig;
pub use message::OutgoingMessage;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// SMTP reply codes that mean the server refused our credentials.
///
/// 530 is left out: servers also send it to MAIL when they require STARTTLS.
const AUTH_FAILURE_CODES: [u16; 3] = [534, 535, 538];

/// SMTP-related errors
#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS failed: {0}")]
    TlsFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Message rejected by server: {0}")]
    Rejected(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid email address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Message formatting error: {0}")]
    MessageFormatError(String),

    #[error("Cannot read attachment {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Message build error: {0}")]
    MessageBuildError(#[from] lettre::error::Error),
}

impl From<lettre::transport::smtp::Error> for SmtpError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        if err.is_tls() {
            return SmtpError::TlsFailed(err.to_string());
        }

        if let Some(code) = err.status() {
            return if AUTH_FAILURE_CODES.contains(&u16::from(code)) {
                SmtpError::AuthenticationFailed(err.to_string())
            } else {
                SmtpError::Rejected(err.to_string())
            };
        }

        if err.is_client() || err.is_response() {
            SmtpError::SendFailed(err.to_string())
        } else {
            SmtpError::ConnectionFailed(err.to_string())
        }
    }
}

pub type SmtpResult<T> = Result<T, SmtpError>;

/// SMTP connection security
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum SmtpSecurity {
    /// No encryption
    #[default]
    #[serde(rename = "plain")]
    Plain,
    /// Plain connection upgraded with STARTTLS before anything else is sent
    #[serde(rename = "starttls")]
    #[value(name = "starttls")]
    StartTls,
    /// TLS from the first byte (SMTPS)
    #[serde(rename = "implicit-tls")]
    ImplicitTls,
}

impl SmtpSecurity {
    /// Map the `use_tls` / `use_ssl` flag pair onto a mode. SSL wins when both are set.
    pub fn from_flags(use_tls: bool, use_ssl: bool) -> Self {
        match (use_tls, use_ssl) {
            (_, true) => SmtpSecurity::ImplicitTls,
            (true, false) => SmtpSecurity::StartTls,
            (false, false) => SmtpSecurity::Plain,
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmtpSecurity::Plain => "plain",
            SmtpSecurity::StartTls => "starttls",
            SmtpSecurity::ImplicitTls => "implicit-tls",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful send.
///
/// The `Display` form is the one-line confirmation shown to the user.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: Option<String>,
    pub recipients: Vec<String>,
    pub subject: String,
    pub server_reply: String,
    pub sent_at: chrono::DateTime<chrono::Utc>,
}

impl fmt::Display for SendReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Email sent to [{}] with subject '{}'",
            self.recipients.join(", "),
            self.subject
        )
    }
}
