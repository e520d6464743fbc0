//! Send email over SMTP.
//!
//! [`MailDispatcher`](smtp::MailDispatcher) turns an
//! [`OutgoingMessage`](smtp::OutgoingMessage) into a `multipart/alternative`
//! MIME message (plain text, optional HTML, base64 attachments) and delivers
//! it to every To, Cc and Bcc recipient over a plain, STARTTLS or
//! implicit-TLS connection.

pub mod cli;
pub mod smtp;

pub use smtp::{MailDispatcher, OutgoingMessage, SendReceipt, SmtpConfig, SmtpError, SmtpSecurity};
