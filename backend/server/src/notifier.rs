//! # Webhook notifications
//!
//! One fixed message per task event, posted as `{"text": ...}` to the chat webhook.
//! Failures are logged and dropped: the mutation they report has already been stored.
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Added,
    Edited,
    Deleted,
}

impl Event {
    pub fn message(self) -> &'static str {
        match self {
            Event::Added => "任務加好了!",
            Event::Edited => "任務改好了!",
            Event::Deleted => "任務已刪除了!",
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            webhook_url,
        })
    }

    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            webhook_url: None,
        }
    }

    pub async fn notify(&self, event: Event) {
        match self.send(event).await {
            Ok(true) => debug!(?event, "Webhook notified"),
            Ok(false) => debug!(?event, "No webhook configured, skipping"),
            Err(e) => warn!(?event, "Notification dropped: {e}"),
        }
    }

    async fn send(&self, event: Event) -> Result<bool, NotifyError> {
        let Some(url) = &self.webhook_url else {
            return Ok(false);
        };

        let response = self
            .client
            .post(url)
            .json(&json!({ "text": event.message() }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status { status, body });
        }

        Ok(true)
    }
}
