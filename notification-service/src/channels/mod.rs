//! Notification channels.
//!
//! Every HTTP channel shares the same 429 handling: wait for the delay the
//! service asks for, up to [`MAX_RATE_LIMIT_RETRIES`] attempts in total.

mod discord;
#[cfg(feature = "desktop")]
mod desktop;
mod ntfy;
mod telegram;
mod webhook;

pub use discord::DiscordChannel;
#[cfg(feature = "desktop")]
pub use desktop::DesktopChannel;
pub use ntfy::NtfyChannel;
pub use telegram::TelegramChannel;
pub use webhook::JsonWebhookChannel;

use async_trait::async_trait;
use notifier_core::NotificationError;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of attempts for rate-limited requests.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 3;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// One delivery target.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Deliver a notification with the given title and body.
    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError>;
}

/// Sends the request built by `build`, retrying on 429.
pub(crate) async fn send_with_retry<F>(
    channel: &'static str,
    build: F,
) -> Result<(), NotificationError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        let response = build()
            .send()
            .await
            .map_err(|e| delivery_failed(channel, format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response).await;

            if attempts >= MAX_RATE_LIMIT_RETRIES {
                warn!(
                    "{} rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                    channel, MAX_RATE_LIMIT_RETRIES, retry_after
                );
                return Err(NotificationError::RateLimited {
                    channel: channel.to_string(),
                    attempts,
                });
            }

            let wait_duration = retry_after
                .unwrap_or(DEFAULT_RETRY_AFTER)
                .min(MAX_RETRY_AFTER);
            debug!(
                "{} rate limited (429), waiting {:?} before retry (attempt {}/{})",
                channel, wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
            );
            tokio::time::sleep(wait_duration).await;
            continue;
        }

        let body = response.text().await.unwrap_or_default();
        return Err(delivery_failed(channel, format!("{} - {}", status, body)));
    }
}

/// Retry delay of a 429 response: the `Retry-After` or
/// `X-RateLimit-Reset-After` header, else a `retry_after` field in the JSON
/// body (Discord puts it at the top level, Telegram under `parameters`).
async fn parse_retry_after(response: Response) -> Option<Duration> {
    for header in ["retry-after", "x-ratelimit-reset-after"] {
        let seconds = response
            .headers()
            .get(header)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());
        if let Some(seconds) = seconds {
            return seconds_to_duration(seconds);
        }
    }

    let body: serde_json::Value = response.json().await.ok()?;
    body.get("retry_after")
        .or_else(|| body.get("parameters").and_then(|p| p.get("retry_after")))
        .and_then(|v| v.as_f64())
        .and_then(seconds_to_duration)
}

/// Negative, NaN and unrepresentable values are `None`; the rest is capped
/// at [`MAX_RETRY_AFTER`].
fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .or_else(|| (seconds.is_sign_positive() && seconds > 0.0).then_some(MAX_RETRY_AFTER))
        .map(|delay| delay.min(MAX_RETRY_AFTER))
}

pub(crate) fn delivery_failed(channel: &str, reason: impl Into<String>) -> NotificationError {
    NotificationError::DeliveryFailed {
        channel: channel.to_string(),
        reason: reason.into(),
    }
}

/// Cuts `text` to at most `limit` characters, marking the cut.
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "…";
    let truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
    format!("{}{}", truncated, suffix)
}
