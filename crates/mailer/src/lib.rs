//! Outbound email transport for relay.
//!
//! The `Mailer` trait is the seam between campaign/email execution and the
//! delivery provider. `HttpMailer` posts messages to an HTTP relay endpoint;
//! `RecordingMailer` is the in-process double used by executor tests.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("mail endpoint rejected message: status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone, Debug, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError>;
}

/// Delivery via an HTTP relay endpoint (JSON POST with bearer auth).
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    from_address: String,
    api_key: SecretString,
}

impl HttpMailer {
    pub fn new(
        endpoint: String,
        from_address: String,
        api_key: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, MailerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, endpoint, from_address, api_key })
    }
}

fn check_recipient(address: &str) -> Result<(), MailerError> {
    let trimmed = address.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(MailerError::InvalidRecipient(address.to_string()));
    }
    Ok(())
}

#[derive(Serialize)]
struct DeliveryRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        check_recipient(&email.to)?;

        let request = DeliveryRequest {
            from: &self.from_address,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: email.text.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret()) // ubs:ignore
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected { status: status.as_u16(), body });
        }

        debug!(event_name = "mailer.delivery.accepted", to = %email.to, "email accepted");
        Ok(())
    }
}

/// Test double that records every send and fails configured addresses.
#[derive(Default)]
pub struct RecordingMailer {
    sent: tokio::sync::Mutex<Vec<OutboundEmail>>,
    failing: Vec<String>,
}

impl RecordingMailer {
    pub fn failing_for(addresses: Vec<String>) -> Self {
        Self { sent: tokio::sync::Mutex::new(Vec::new()), failing: addresses }
    }

    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        check_recipient(&email.to)?;
        if self.failing.iter().any(|addr| addr == &email.to) {
            return Err(MailerError::Rejected {
                status: 550,
                body: format!("mailbox unavailable: {}", email.to),
            });
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}
