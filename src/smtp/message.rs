use crate::smtp::{SmtpError, SmtpResult};
use lettre::{
    address::Envelope,
    message::{
        header::{ContentDisposition, ContentTransferEncoding, ContentType},
        Mailbox, MultiPart, SinglePart,
    },
    Address, Message,
};
use std::path::{Path, PathBuf};

const ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";

/// An email to be dispatched: addresses, subject, bodies and attachment paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    /// Delivered to, never written into a header
    pub bcc: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub attachments: Vec<PathBuf>,
}

impl OutgoingMessage {
    /// Create a plain-text message
    pub fn new(
        from: impl Into<String>,
        to: Vec<String>,
        subject: impl Into<String>,
        body_text: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to,
            subject: subject.into(),
            body_text: body_text.into(),
            ..Default::default()
        }
    }

    pub fn with_html(mut self, body_html: impl Into<String>) -> Self {
        self.body_html = Some(body_html.into());
        self
    }

    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    pub fn with_bcc(mut self, bcc: Vec<String>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    /// HTML alternative, if there is one with content
    pub fn html_body(&self) -> Option<&str> {
        self.body_html.as_deref().filter(|html| !html.is_empty())
    }

    /// All transport-level recipients: To, then Cc, then Bcc. Duplicates are kept.
    pub fn all_recipients(&self) -> Vec<String> {
        let mut recipients = Vec::with_capacity(self.to.len() + self.cc.len() + self.bcc.len());
        recipients.extend(self.to.iter().cloned());
        recipients.extend(self.cc.iter().cloned());
        recipients.extend(self.bcc.iter().cloned());
        recipients
    }

    /// SMTP envelope for this message
    pub fn envelope(&self) -> SmtpResult<Envelope> {
        if self.to.is_empty() {
            return Err(SmtpError::MessageFormatError(
                "At least one recipient is required".to_string(),
            ));
        }

        let from = parse_address(&self.from)?;
        let recipients = self
            .all_recipients()
            .iter()
            .map(|addr| parse_address(addr))
            .collect::<SmtpResult<Vec<_>>>()?;

        Ok(Envelope::new(Some(from), recipients)?)
    }

    /// Assemble the MIME message.
    ///
    /// Every attachment is read here, so an unreadable file fails before any
    /// connection is made.
    pub fn to_lettre_message(&self) -> SmtpResult<Message> {
        let envelope = self.envelope()?;

        let mut message_builder = Message::builder()
            .from(parse_mailbox(&self.from)?)
            .subject(self.subject.as_str())
            .message_id(None)
            .envelope(envelope);

        for to in &self.to {
            message_builder = message_builder.to(parse_mailbox(to)?);
        }

        for cc in &self.cc {
            message_builder = message_builder.cc(parse_mailbox(cc)?);
        }

        // Plain first, HTML second: readers prefer the last alternative they can render
        let text_part = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(self.body_text.clone());

        let mut alternative = MultiPart::alternative().singlepart(text_part);

        if let Some(html_body) = self.html_body() {
            let html_part = SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(html_body.to_string());
            alternative = alternative.singlepart(html_part);
        }

        for path in &self.attachments {
            alternative = alternative.singlepart(attachment_part(path)?);
        }

        tracing::debug!(
            "Built message '{}' with {} attachment(s), html: {}",
            self.subject,
            self.attachments.len(),
            self.html_body().is_some()
        );

        Ok(message_builder.multipart(alternative)?)
    }
}

/// Filename advertised for an attachment: everything after the last path separator
pub fn attachment_filename(path: &Path) -> String {
    let raw = path.to_string_lossy();
    raw.rsplit(|c: char| c == '/' || c == std::path::MAIN_SEPARATOR)
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Read a file fully and wrap it as a base64 `application/octet-stream` part
fn attachment_part(path: &Path) -> SmtpResult<SinglePart> {
    let content = std::fs::read(path).map_err(|source| SmtpError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;

    let content_type = ContentType::parse(ATTACHMENT_CONTENT_TYPE)
        .map_err(|e| SmtpError::MessageFormatError(e.to_string()))?;
    let filename = attachment_filename(path);

    tracing::debug!("Attaching {} ({} bytes)", filename, content.len());

    Ok(SinglePart::builder()
        .header(content_type)
        .header(ContentTransferEncoding::Base64)
        .header(ContentDisposition::attachment(&filename))
        .body(content))
}

/// Parse a bare address or a "Name <email@domain>" mailbox
fn parse_mailbox(address: &str) -> SmtpResult<Mailbox> {
    let trimmed = address.trim();

    if let (Some(start), Some(end)) = (trimmed.find('<'), trimmed.rfind('>')) {
        if start < end {
            let name = trimmed[..start].trim().trim_matches('"');
            let email = parse_address(&trimmed[start + 1..end])?;
            let name = (!name.is_empty()).then(|| name.to_string());
            return Ok(Mailbox::new(name, email));
        }
    }

    Ok(Mailbox::new(None, parse_address(trimmed)?))
}

/// Parse the bare address part of a mailbox string
fn parse_address(address: &str) -> SmtpResult<Address> {
    let trimmed = address.trim();
    let bare = match (trimmed.find('<'), trimmed.rfind('>')) {
        (Some(start), Some(end)) if start < end => &trimmed[start + 1..end],
        _ => trimmed,
    };

    bare.parse::<Address>()
        .map_err(|source| SmtpError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}
