//! ntfy notification service
//!
//! Posts plain-text messages to `{server}/{topic}`. The title header is
//! ASCII-sanitized because HTTP headers reject non-ASCII bytes.

use super::{NotificationEvent, NotificationService};
use std::time::Duration;

/// ntfy notifier configuration
#[derive(Debug, Clone)]
pub struct NtfyConfig {
    /// Server base URL
    pub server: String,
    /// Topic to publish to; empty disables the notifier
    pub topic: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            server: "https://ntfy.sh".to_string(),
            topic: String::new(),
            timeout_ms: 10_000,
        }
    }
}

/// ntfy notification service
pub struct NtfyNotifier {
    client: reqwest::Client,
    server: String,
    topic: String,
}

impl NtfyNotifier {
    /// Create a new ntfy notifier
    pub fn new(config: NtfyConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            server: config.server.trim_end_matches('/').to_string(),
            topic: config.topic,
        })
    }

    /// Strip non-ASCII characters from a header value
    fn sanitize_title(title: &str) -> String {
        title.chars().filter(|c| c.is_ascii()).collect::<String>().trim().to_string()
    }
}

#[async_trait::async_trait]
impl NotificationService for NtfyNotifier {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()> {
        let url = format!("{}/{}", self.server, self.topic);

        let response = self
            .client
            .post(&url)
            .header("Title", Self::sanitize_title(event.title()))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(event.format_message())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("ntfy returned {}: {}", status, body);
        }

        tracing::info!(title = event.title(), "Sent ntfy notification");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        !self.topic.is_empty()
    }
}
