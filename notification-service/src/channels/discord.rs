//! Discord webhook notification channel.

use async_trait::async_trait;
use notifier_core::NotificationError;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{send_with_retry, truncate, NotificationChannel};

const DISCORD_WEBHOOK_BASE: &str = "https://discord.com/api/webhooks";
const EMBED_TITLE_LIMIT: usize = 256;
const EMBED_DESCRIPTION_LIMIT: usize = 4096;
const EMBED_COLOR: u32 = 0xff4500;

pub struct DiscordChannel {
    client: Client,
    webhook_url: String,
    username: String,
}

impl DiscordChannel {
    pub fn new(client: Client, webhook_id: &str, webhook_token: &str) -> Self {
        Self {
            client,
            webhook_url: format!("{}/{}/{}", DISCORD_WEBHOOK_BASE, webhook_id, webhook_token),
            username: "Reddit Post Notifier".to_string(),
        }
    }

    fn build_payload(&self, title: &str, body: &str) -> serde_json::Value {
        let mut embed = json!({
            "title": truncate(title, EMBED_TITLE_LIMIT),
            "description": truncate(body, EMBED_DESCRIPTION_LIMIT),
            "color": EMBED_COLOR,
        });
        if body.starts_with("http") {
            embed["url"] = json!(body);
        }

        json!({
            "username": self.username,
            "embeds": [embed],
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        let payload = self.build_payload(title, body);
        send_with_retry(self.channel_type(), || {
            self.client.post(&self.webhook_url).json(&payload)
        })
        .await?;

        debug!("Discord notification sent: {}", title);
        Ok(())
    }
}
