use crate::channels::{
    DiscordChannel, JsonWebhookChannel, NotificationChannel, NtfyChannel, TelegramChannel,
};
use crate::descriptor::ChannelDescriptor;
use async_trait::async_trait;
use futures::future::join_all;
use notifier_core::{ConfigError, CoreError, NotificationError, NotificationSink};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one fan-out.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failures: Vec<NotificationError>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sends every notification to all configured channels.
pub struct NotificationHub {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationHub {
    /// Parses every descriptor up front; one bad descriptor fails startup.
    pub fn from_descriptors(descriptors: &[String]) -> Result<Self, CoreError> {
        let client = Client::builder()
            .user_agent(concat!("reddit-post-notifier/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(CoreError::Network)?;

        let mut channels = Vec::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            let parsed = ChannelDescriptor::parse(descriptor).map_err(|e| {
                ConfigError::InvalidValue {
                    field: format!("notifications[{}]", index),
                    reason: e.to_string(),
                }
            })?;
            info!("Notifying via {}", parsed.label());
            channels.push(channel_for(parsed, &client).map_err(|e| ConfigError::InvalidValue {
                field: format!("notifications[{}]", index),
                reason: e.to_string(),
            })?);
        }

        if channels.is_empty() {
            warn!("No notification channels configured, matches will only be logged");
        }

        Ok(Self { channels })
    }

    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Delivers to every channel concurrently. Failures are logged and
    /// collected, never propagated.
    pub async fn notify(&self, title: &str, body: &str) -> DeliveryReport {
        let results = join_all(self.channels.iter().map(|channel| async move {
            (channel.channel_type(), channel.send(title, body).await)
        }))
        .await;

        let mut report = DeliveryReport::default();
        for (channel, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Notification via {} failed: {}", channel, e);
                    report.failures.push(e);
                }
            }
        }
        report
    }
}

fn channel_for(
    descriptor: ChannelDescriptor,
    client: &Client,
) -> Result<Box<dyn NotificationChannel>, NotificationError> {
    let channel: Box<dyn NotificationChannel> = match descriptor {
        ChannelDescriptor::Discord {
            webhook_id,
            webhook_token,
        } => Box::new(DiscordChannel::new(client.clone(), &webhook_id, &webhook_token)),
        ChannelDescriptor::Telegram {
            bot_token,
            chat_ids,
        } => Box::new(TelegramChannel::new(client.clone(), &bot_token, chat_ids)),
        ChannelDescriptor::Json { url } => Box::new(JsonWebhookChannel::new(client.clone(), url)),
        ChannelDescriptor::Ntfy { url } => Box::new(NtfyChannel::new(client.clone(), url)),
        #[cfg(feature = "desktop")]
        ChannelDescriptor::Desktop => Box::new(crate::channels::DesktopChannel::new()),
        #[cfg(not(feature = "desktop"))]
        ChannelDescriptor::Desktop => {
            return Err(NotificationError::UnsupportedDescriptor {
                descriptor: "desktop:// (built without the desktop feature)".to_string(),
            })
        }
    };
    Ok(channel)
}

#[async_trait]
impl NotificationSink for NotificationHub {
    async fn send(&self, title: &str, body: &str) {
        let report = self.notify(title, body).await;
        debug!(
            "Notification delivered to {}/{} channels",
            report.delivered,
            self.channels.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Sent = Arc<Mutex<Vec<(String, String)>>>;

    struct RecordingChannel {
        sent: Sent,
        fail: bool,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn channel_type(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError> {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            if self.fail {
                Err(NotificationError::DeliveryFailed {
                    channel: "recording".to_string(),
                    reason: "HTTP 500".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn recording(sent: &Sent, fail: bool) -> Box<dyn NotificationChannel> {
        Box::new(RecordingChannel {
            sent: sent.clone(),
            fail,
        })
    }

    #[test]
    fn test_from_descriptors() {
        let hub = NotificationHub::from_descriptors(&[
            "discord://1234/token".to_string(),
            "tgram://123:ABC/42".to_string(),
            "json://localhost:8080/hook".to_string(),
            "ntfy://alerts".to_string(),
        ])
        .unwrap();
        assert_eq!(hub.len(), 4);
    }

    #[test]
    fn test_empty_descriptor_list_is_allowed() {
        let hub = NotificationHub::from_descriptors(&[]).unwrap();
        assert!(hub.is_empty());
    }

    #[test]
    fn test_unsupported_descriptor_is_a_config_error() {
        let result = NotificationHub::from_descriptors(&[
            "discord://1234/token".to_string(),
            "mailto://someone@example.com".to_string(),
        ]);

        match result {
            Err(CoreError::Config(ConfigError::InvalidValue { field, reason })) => {
                assert_eq!(field, "notifications[1]");
                assert!(reason.contains("mailto"));
            }
            other => panic!("expected config error, got {:?}", other.map(|h| h.len())),
        }
    }

    #[tokio::test]
    async fn test_notify_fans_out_and_collects_failures() {
        let sent: Sent = Arc::new(Mutex::new(Vec::new()));
        let hub = NotificationHub::with_channels(vec![
            recording(&sent, false),
            recording(&sent, true),
            recording(&sent, false),
        ]);

        let report = hub
            .notify("Title", "https://www.reddit.com/r/news/comments/x/")
            .await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.all_delivered());
        assert_eq!(sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sink_swallows_failures() {
        let sent: Sent = Arc::new(Mutex::new(Vec::new()));
        let hub = NotificationHub::with_channels(vec![recording(&sent, true)]);
        let sink: &dyn NotificationSink = &hub;

        sink.send("Title", "body").await;

        assert_eq!(
            sent.lock().unwrap().as_slice(),
            &[("Title".to_string(), "body".to_string())]
        );
    }
}
