//! Native desktop notifications.

use async_trait::async_trait;
use notifier_core::NotificationError;
use notify_rust::Notification;
use tracing::debug;

use super::{delivery_failed, NotificationChannel};

const APP_NAME: &str = "Reddit Post Notifier";

#[derive(Debug, Default)]
pub struct DesktopChannel;

impl DesktopChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationChannel for DesktopChannel {
    fn channel_type(&self) -> &'static str {
        "desktop"
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), NotificationError> {
        let title = title.to_string();
        let body = body.to_string();

        // Showing a notification talks to the session bus and blocks
        tokio::task::spawn_blocking(move || {
            Notification::new()
                .appname(APP_NAME)
                .summary(&title)
                .body(&body)
                .show()
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| delivery_failed("desktop", format!("notification task failed: {}", e)))?
        .map_err(|e| delivery_failed("desktop", e))?;

        debug!("Desktop notification shown");
        Ok(())
    }
}
