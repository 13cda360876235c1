//! JSON webhook notifier.
//!
//! Posts `{"subject": .., "text": ..}` to a URL. Works with chat incoming
//! webhooks and mail relays that accept JSON.

use super::Notifier;
use crate::errors::JamError;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    text: &'a str,
}

pub struct WebhookNotifier {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, JamError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JamError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: url.to_string(),
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), JamError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&WebhookPayload {
                subject,
                text: body,
            })
            .send()
            .await
            .map_err(|e| JamError::Notification(format!("webhook request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(JamError::Notification(format!(
                "webhook returned {}: {}",
                status, body
            )));
        }

        info!("Summary notification sent");
        Ok(())
    }
}
