//! Telegram Bot API notification channel.
//!
//! Sends messages via `POST /bot<token>/sendMessage`, once per chat.

use async_trait::async_trait;
use notifier_core::NotificationError;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use super::{send_with_retry, truncate, NotificationChannel};

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

pub struct TelegramChannel {
    client: Client,
    send_url: String,
    chat_ids: Vec<String>,
}

impl TelegramChannel {
    pub fn new(client: Client, bot_token: &str, chat_ids: Vec<String>) -> Self {
        Self {
            client,
            send_url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
            chat_ids,
        }
    }

    fn build_message(title: &str, body: &str) -> String {
        truncate(&format!("{}\n{}", title, body), TELEGRAM_MESSAGE_LIMIT)
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn channel_type(&self) -> &'static str {
        "telegram"
    }

    /// Fails if any chat could not be reached; the others are still tried.
    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        let text = Self::build_message(title, body);
        let mut last_error = None;

        for chat_id in &self.chat_ids {
            let payload = json!({
                "chat_id": chat_id,
                "text": text,
            });

            let result = send_with_retry(self.channel_type(), || {
                self.client.post(&self.send_url).json(&payload)
            })
            .await;

            if let Err(e) = result {
                warn!("Telegram delivery to chat {} failed: {}", chat_id, e);
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => {
                debug!("Telegram notification sent to {} chats", self.chat_ids.len());
                Ok(())
            }
        }
    }
}
