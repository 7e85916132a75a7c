//! HTTP webhook notification channel

use super::traits::NotificationChannel;
use crate::error::Error;
use crate::types::{Artifact, Channel, Edition, Recipient};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Duration;

/// JSON body POSTed for every notification
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload<'a> {
    /// Recipient identity
    pub recipient: &'a str,
    /// Recipient display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<&'a str>,
    /// Edition title
    pub title: &'a str,
    /// Issue identifier
    pub issue: &'a str,
    /// Publication date
    pub publication_date: NaiveDate,
    /// Source download reference
    pub source_ref: &'a str,
    /// Artifact file name
    pub file_name: &'a str,
    /// Artifact MIME type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<&'a str>,
    /// Artifact size in bytes
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the artifact
    pub sha256: String,
}

/// Notification channel that POSTs a JSON payload to a mail or chat relay
///
/// A 2xx answer counts as sent. A 4xx answer is a definitive rejection and
/// yields `Ok(false)`. 5xx answers, 429 and network failures are transient
/// errors, retried by the pipeline.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    auth_header: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Notify through `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            auth_header: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Send `value` as the Authorization header
    pub fn with_auth_header(mut self, value: impl Into<String>) -> Self {
        self.auth_header = Some(value.into());
        self
    }

    /// Per-request timeout (default: 30 seconds)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        artifact: &Artifact,
        edition: &Edition,
    ) -> crate::Result<bool> {
        let payload = NotificationPayload {
            recipient: &recipient.identity,
            recipient_name: recipient.name.as_deref(),
            title: &edition.title,
            issue: &edition.issue,
            publication_date: edition.publication_date,
            source_ref: &edition.source_ref,
            file_name: &artifact.file_name,
            content_type: artifact.content_type.as_deref(),
            size_bytes: artifact.data.len() as u64,
            sha256: artifact.sha256(),
        };

        let mut request = self
            .client
            .post(&self.url)
            .json(&payload)
            .timeout(self.timeout);
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await.map_err(|e| Error::Channel {
            channel: Channel::Notify,
            message: format!("failed to reach {}: {}", self.url, e),
            transient: e.is_timeout() || e.is_connect(),
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %self.url, recipient = %recipient.identity, "notification accepted");
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Channel {
                channel: Channel::Notify,
                message: format!("relay returned status {}: {}", status, body),
                transient: true,
            });
        }

        tracing::warn!(
            url = %self.url,
            recipient = %recipient.identity,
            status = %status,
            body = %body,
            "notification rejected"
        );
        Ok(false)
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
