//! Reqwest-backed sender for a Mailtrap-style JSON send API.
//!
//! Transient failures are retried up to [`MAX_DELIVERY_ATTEMPTS`] times with a
//! linear backoff (`attempt * backoff_unit`). Sandbox deliveries carry an
//! `X-Sandbox-Mode: true` header in the message headers.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::templates::{RenderedMail, render};
use crate::domain::ports::{MailError, MailMessage, MailSender};

/// Attempts per message, including the first.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;
const SANDBOX_HEADER: &str = "X-Sandbox-Mode";
const MAIL_CATEGORY: &str = "user_notification";
const DEFAULT_FROM_NAME: &str = "Social";

/// Provider endpoint, credentials, and delivery policy.
#[derive(Clone)]
pub struct HttpMailConfig {
    pub endpoint: Url,
    pub api_key: Zeroizing<String>,
    pub from_email: String,
    pub from_name: String,
    pub sandbox: bool,
    pub request_timeout: Duration,
    pub backoff_unit: Duration,
}

impl HttpMailConfig {
    /// Defaults: 10 s request timeout, 1 s backoff unit, production mode.
    pub fn new(endpoint: Url, api_key: impl Into<String>, from_email: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: Zeroizing::new(api_key.into()),
            from_email: from_email.into(),
            from_name: DEFAULT_FROM_NAME.to_owned(),
            sandbox: false,
            request_timeout: Duration::from_secs(10),
            backoff_unit: Duration::from_secs(1),
        }
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }
}

impl fmt::Debug for HttpMailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMailConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("sandbox", &self.sandbox)
            .field("request_timeout", &self.request_timeout)
            .field("backoff_unit", &self.backoff_unit)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: Address<'a>,
    to: [Address<'a>; 1],
    subject: &'a str,
    html: &'a str,
    category: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<&'static str, &'static str>,
}

/// Mail sender posting JSON to an HTTP provider.
pub struct HttpMailSender {
    client: Client,
    config: HttpMailConfig,
}

impl HttpMailSender {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: HttpMailConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    fn payload<'a>(&'a self, message: &'a MailMessage, rendered: &'a RenderedMail) -> SendRequest<'a> {
        build_payload(&self.config, message, rendered)
    }

    async fn attempt(&self, body: &SendRequest<'_>) -> Result<(), MailError> {
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .bearer_auth(self.config.api_key.as_str())
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(map_status_error(status, &text))
    }
}

fn build_payload<'a>(
    config: &'a HttpMailConfig,
    message: &'a MailMessage,
    rendered: &'a RenderedMail,
) -> SendRequest<'a> {
    let recipient_name = if message.recipient_name.is_empty() {
        message
            .recipient_email
            .split('@')
            .next()
            .unwrap_or_default()
    } else {
        message.recipient_name.as_str()
    };
    let mut headers = BTreeMap::new();
    if config.sandbox {
        headers.insert(SANDBOX_HEADER, "true");
    }
    SendRequest {
        from: Address {
            email: &config.from_email,
            name: &config.from_name,
        },
        to: [Address {
            email: &message.recipient_email,
            name: recipient_name,
        }],
        subject: &rendered.subject,
        html: &rendered.html,
        category: MAIL_CATEGORY,
        headers,
    }
}

/// Delay before the attempt following `attempt` (1-based).
fn backoff(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

fn map_transport_error(error: reqwest::Error) -> MailError {
    if error.is_timeout() {
        MailError::timeout(error.to_string())
    } else {
        MailError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str) -> MailError {
    const PREVIEW_CHAR_LIMIT: usize = 160;
    let preview: String = body.chars().take(PREVIEW_CHAR_LIMIT).collect();
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            MailError::timeout(format!("status {}", status.as_u16()))
        }
        _ => MailError::rejected(status.as_u16(), preview),
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let rendered = render(message)?;
        let body = self.payload(message, &rendered);

        let mut attempt = 1;
        loop {
            match self.attempt(&body).await {
                Ok(()) => {
                    info!(template = %message.template, attempt, "mail delivered");
                    return Ok(());
                }
                Err(err) if err.is_transient() && attempt < MAX_DELIVERY_ATTEMPTS => {
                    let delay = backoff(self.config.backoff_unit, attempt);
                    warn!(
                        template = %message.template,
                        attempt,
                        max_attempts = MAX_DELIVERY_ATTEMPTS,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "mail delivery failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(template = %message.template, attempt, error = %err, "mail delivery failed");
                    return Err(err);
                }
            }
        }
    }
}
