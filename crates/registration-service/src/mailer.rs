//! Transactional email delivery

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::MailError;

/// A file attached to an email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A single-recipient HTML email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Wire format of the mail API
#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    attachments: Vec<OutgoingAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct OutgoingAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    /// Base64-encoded file content
    content: String,
}

impl<'a> OutgoingEmail<'a> {
    fn new(from: &'a str, email: &'a Email) -> Self {
        Self {
            from,
            to: [email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
            attachments: email
                .attachments
                .iter()
                .map(|a| OutgoingAttachment {
                    filename: &a.filename,
                    content_type: &a.content_type,
                    content: STANDARD.encode(&a.content),
                })
                .collect(),
        }
    }
}

/// Client for an HTTP transactional email API
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(
        api_url: String,
        api_key: String,
        from: String,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let payload = OutgoingEmail::new(&self.from, email);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MailError::Rejected { status, body });
        }

        info!("Email sent: {}", email.subject);
        debug!("Email recipient: {}", email.to);
        Ok(())
    }
}

/// Logs emails instead of sending them and keeps them in an outbox
#[derive(Default)]
pub struct LogMailer {
    outbox: Mutex<Vec<Email>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every email "sent" so far
    pub fn sent(&self) -> Vec<Email> {
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(
            "[mock mail] subject={:?} attachments={}",
            email.subject,
            email.attachments.len()
        );
        debug!("[mock mail] to={} body: {}", email.to, email.html);

        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email.clone());
        Ok(())
    }
}
