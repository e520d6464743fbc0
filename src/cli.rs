use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::smtp::{MailDispatcher, OutgoingMessage, SendReceipt, SmtpConfig, SmtpSecurity};

/// mailsender - send one email over SMTP
#[derive(Parser, Debug)]
#[command(name = "mailsender")]
#[command(about = "Send an email over SMTP with optional STARTTLS/SMTPS, login and attachments")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// SMTP configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SMTP server, overrides the configuration file
    #[arg(long, required_unless_present = "config")]
    pub server: Option<String>,

    /// SMTP port (default: 25 plain, 587 starttls, 465 implicit-tls)
    #[arg(long)]
    pub port: Option<u16>,

    /// Transport security
    #[arg(long, value_enum)]
    pub security: Option<SmtpSecurity>,

    /// Log in before sending
    #[arg(long)]
    pub auth: bool,

    /// SMTP username
    #[arg(long)]
    pub username: Option<String>,

    /// SMTP password
    #[arg(long, env = "MAILSENDER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Socket timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Sender address
    #[arg(long)]
    pub from: String,

    /// Primary recipient (repeatable)
    #[arg(long, required = true)]
    pub to: Vec<String>,

    /// Cc recipient (repeatable)
    #[arg(long)]
    pub cc: Vec<String>,

    /// Bcc recipient (repeatable), never shown in headers
    #[arg(long)]
    pub bcc: Vec<String>,

    /// Subject line
    #[arg(long, default_value = "")]
    pub subject: String,

    /// Plain-text body
    #[arg(long, required_unless_present = "text_file")]
    pub text: Option<String>,

    /// Read the plain-text body from a file
    #[arg(long, conflicts_with = "text")]
    pub text_file: Option<PathBuf>,

    /// Read an HTML alternative body from a file
    #[arg(long)]
    pub html_file: Option<PathBuf>,

    /// File to attach (repeatable)
    #[arg(long = "attach")]
    pub attachments: Vec<PathBuf>,
}

impl Cli {
    /// Resolve the SMTP configuration: file first, then command line overrides
    pub async fn smtp_config(&self) -> Result<SmtpConfig> {
        let mut config = match &self.config {
            Some(path) => SmtpConfig::load_from_file(path).await?,
            None => {
                let server = self
                    .server
                    .clone()
                    .ok_or_else(|| anyhow!("--server is required without --config"))?;
                let security = self.security.unwrap_or_default();
                SmtpConfig::new(server, default_port(security)).with_security(security)
            }
        };

        if let Some(ref server) = self.server {
            config.server = server.clone();
        }
        if let Some(security) = self.security {
            config.security = security;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.auth {
            config.use_auth = true;
        }
        if self.username.is_some() {
            config.username = self.username.clone();
        }
        if self.password.is_some() {
            config.password = self.password.clone();
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(Duration::from_secs(timeout));
        }

        config.validate()?;
        Ok(config)
    }

    /// Build the message from arguments, reading body files
    pub async fn message(&self) -> Result<OutgoingMessage> {
        let body_text = match (&self.text, &self.text_file) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read text body {}", path.display()))?,
            (None, None) => return Err(anyhow!("A plain-text body is required")),
        };

        let mut message = OutgoingMessage::new(
            self.from.clone(),
            self.to.clone(),
            self.subject.clone(),
            body_text,
        )
        .with_cc(self.cc.clone())
        .with_bcc(self.bcc.clone());

        if let Some(ref path) = self.html_file {
            let html = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read HTML body {}", path.display()))?;
            message = message.with_html(html);
        }

        message.attachments = self.attachments.clone();
        Ok(message)
    }

    /// Send the message. The dispatcher logs the confirmation line.
    pub async fn run(&self) -> Result<SendReceipt> {
        let config = self.smtp_config().await?;
        let message = self.message().await?;

        tracing::debug!("Using {:?}", config);

        let dispatcher = MailDispatcher::new(config);
        let receipt = dispatcher
            .send_async(message)
            .await
            .context("Failed to send email")?;

        Ok(receipt)
    }
}

/// Conventional port for a security mode
pub fn default_port(security: SmtpSecurity) -> u16 {
    match security {
        SmtpSecurity::Plain => 25,
        SmtpSecurity::StartTls => 587,
        SmtpSecurity::ImplicitTls => 465,
    }
}
