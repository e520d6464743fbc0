use crate::smtp::{SmtpError, SmtpResult, SmtpSecurity};
use lettre::transport::smtp::authentication::Credentials;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// SMTP endpoint configuration.
///
/// Built once and handed to [`MailDispatcher`](crate::smtp::MailDispatcher);
/// nothing in it changes between sends.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server, e.g. "localhost" or "smtp.example.com"
    pub server: String,

    /// SMTP port, e.g. 25, 587, 465
    pub port: u16,

    /// Transport security mode
    #[serde(default)]
    pub security: SmtpSecurity,

    /// Log in before sending
    #[serde(default)]
    pub use_auth: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Socket timeout in seconds; the SMTP client default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl SmtpConfig {
    /// Plain, unauthenticated configuration for `server:port`
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            security: SmtpSecurity::Plain,
            use_auth: false,
            username: None,
            password: None,
            timeout_secs: None,
        }
    }

    pub fn with_security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self
    }

    /// Enable authentication with the given credentials
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.use_auth = true;
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the socket timeout, rounded up to whole seconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let partial = u64::from(timeout.subsec_nanos() > 0);
        self.timeout_secs = Some(timeout.as_secs().saturating_add(partial));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Credentials to log in with, if any.
    ///
    /// Authentication only happens when `use_auth` is set and both username
    /// and password are non-empty. Anything less sends without logging in.
    pub fn credentials(&self) -> Option<Credentials> {
        if !self.use_auth {
            return None;
        }

        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials::new(username.to_string(), password.to_string()))
            }
            _ => {
                tracing::warn!(
                    "Authentication enabled for {}:{} but username or password is missing, sending without login",
                    self.server,
                    self.port
                );
                None
            }
        }
    }

    /// Check the fields a connection cannot do without
    pub fn validate(&self) -> SmtpResult<()> {
        if self.server.trim().is_empty() {
            return Err(SmtpError::InvalidConfig(
                "SMTP server cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(SmtpError::InvalidConfig(
                "SMTP port cannot be zero".to_string(),
            ));
        }

        if self.timeout_secs == Some(0) {
            return Err(SmtpError::InvalidConfig(
                "SMTP timeout must be at least one second".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: impl AsRef<Path>) -> SmtpResult<Self> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SmtpError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: SmtpConfig = toml::from_str(&content).map_err(|e| {
            SmtpError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> SmtpResult<()> {
        let path = path.as_ref();
        self.validate()?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| SmtpError::InvalidConfig(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SmtpError::InvalidConfig(format!("Failed to create config directory: {}", e))
            })?;
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|e| SmtpError::InvalidConfig(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("use_auth", &self.use_auth)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
