use crate::smtp::{OutgoingMessage, SendReceipt, SmtpConfig, SmtpError, SmtpResult, SmtpSecurity};
use lettre::{
    transport::smtp::client::{Tls, TlsParameters},
    SmtpTransport, Transport,
};

/// Sends messages to one SMTP endpoint.
///
/// Every [`send`](Self::send) opens its own connection and closes it before
/// returning, so a dispatcher can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct MailDispatcher {
    config: SmtpConfig,
}

impl MailDispatcher {
    /// Store the configuration. No connection is made until a send.
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Build the lettre transport from configuration
    fn build_transport(&self) -> SmtpResult<SmtpTransport> {
        let config = &self.config;
        config.validate()?;

        let tls = match config.security {
            SmtpSecurity::Plain => Tls::None,
            SmtpSecurity::StartTls => Tls::Required(self.tls_parameters()?),
            SmtpSecurity::ImplicitTls => Tls::Wrapper(self.tls_parameters()?),
        };

        let mut builder = SmtpTransport::builder_dangerous(config.server.as_str())
            .port(config.port)
            .tls(tls);

        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(Some(timeout));
        }

        if let Some(credentials) = config.credentials() {
            builder = builder.credentials(credentials);
        }

        Ok(builder.build())
    }

    /// TLS parameters with default certificate verification
    fn tls_parameters(&self) -> SmtpResult<TlsParameters> {
        TlsParameters::new(self.config.server.clone()).map_err(|e| {
            SmtpError::TlsFailed(format!("TLS configuration failed: {}", e))
        })
    }

    /// Send an email message.
    ///
    /// Blocks for the whole exchange: message assembly (including attachment
    /// reads), connect, optional STARTTLS, optional login, one transaction for
    /// every To, Cc and Bcc recipient, then QUIT.
    pub fn send(&self, message: &OutgoingMessage) -> SmtpResult<SendReceipt> {
        let email = message.to_lettre_message()?;
        let transport = self.build_transport()?;

        tracing::debug!(
            "Connecting to {}:{} ({})",
            self.config.server,
            self.config.port,
            self.config.security
        );

        let response = transport.send(&email).map_err(|e| {
            tracing::error!("Failed to send email: {}", e);
            SmtpError::from(e)
        })?;

        let receipt = SendReceipt {
            message_id: email
                .headers()
                .get_raw("Message-ID")
                .map(|h| h.to_string()),
            recipients: message.all_recipients(),
            subject: message.subject.clone(),
            server_reply: response.message().collect::<Vec<_>>().join(" "),
            sent_at: chrono::Utc::now(),
        };

        tracing::info!("{}", receipt);
        Ok(receipt)
    }

    /// Send from async code.
    ///
    /// The blocking exchange runs as a single unit on tokio's blocking pool.
    pub async fn send_async(&self, message: OutgoingMessage) -> SmtpResult<SendReceipt> {
        let dispatcher = self.clone();

        tokio::task::spawn_blocking(move || dispatcher.send(&message))
            .await
            .map_err(|e| SmtpError::SendFailed(format!("Dispatch task failed: {}", e)))?
    }
}
