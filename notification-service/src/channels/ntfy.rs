//! ntfy notification channel.

use async_trait::async_trait;
use notifier_core::NotificationError;
use reqwest::header::HeaderValue;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{delivery_failed, send_with_retry, NotificationChannel};

pub struct NtfyChannel {
    client: Client,
    topic_url: Url,
}

impl NtfyChannel {
    pub fn new(client: Client, topic_url: Url) -> Self {
        Self { client, topic_url }
    }

    /// Header values must be a single line without control characters.
    /// ntfy reads raw UTF-8 bytes, so non-ASCII titles are kept.
    fn title_header(title: &str) -> Result<HeaderValue, NotificationError> {
        let cleaned: String = title
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        HeaderValue::from_bytes(cleaned.trim().as_bytes())
            .map_err(|e| delivery_failed("ntfy", format!("invalid title: {}", e)))
    }
}

#[async_trait]
impl NotificationChannel for NtfyChannel {
    fn channel_type(&self) -> &'static str {
        "ntfy"
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        let title = Self::title_header(title)?;
        let click = HeaderValue::from_str(body).ok().filter(|_| body.starts_with("http"));

        send_with_retry(self.channel_type(), || {
            let request = self
                .client
                .post(self.topic_url.clone())
                .header("Title", title.clone())
                .body(body.to_string());
            match &click {
                Some(link) => request.header("Click", link.clone()),
                None => request,
            }
        })
        .await?;

        debug!("ntfy notification sent to {}", self.topic_url);
        Ok(())
    }
}
