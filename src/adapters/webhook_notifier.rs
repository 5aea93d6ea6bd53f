//! Chat-robot webhook and log-only notification sinks.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::error::TraderError;
use crate::ports::notification_port::NotificationPort;

#[derive(Serialize)]
struct TextBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct TextMessage<'a> {
    msgtype: &'static str,
    text: TextBody<'a>,
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TraderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TraderError::Io(std::io::Error::other(e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn post(&self, message: &str) -> Result<(), String> {
        let body = TextMessage {
            msgtype: "text",
            text: TextBody { content: message },
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        Ok(())
    }
}

impl NotificationPort for WebhookNotifier {
    fn notify(&self, message: &str) {
        if let Err(e) = self.post(message) {
            warn!(error = %e, "notification delivery failed");
        }
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationPort for LogNotifier {
    fn notify(&self, message: &str) {
        info!(message, "notification");
    }
}
