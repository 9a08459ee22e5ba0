use crate::{CoreError, RedditPost};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazily produced, unbounded sequence of newly created posts.
///
/// An `Err` item means the subscription is broken; implementations end the
/// stream right after yielding it.
pub type PostStream = BoxStream<'static, Result<RedditPost, CoreError>>;

/// Where posts come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// `RedditApiError::SubredditNotFound` when the feed does not exist or
    /// redirects; any other error is treated as transient by callers.
    async fn check_feed_exists(&self, feed: &str) -> Result<(), CoreError>;

    /// One multiplexed subscription over every given feed. Posts that
    /// existed before the call are never yielded.
    fn open_combined_subscription(&self, feeds: &[String]) -> PostStream;
}

/// Where matched posts go.
///
/// Delivery is fire-and-forget: channel fan-out, retries and failure
/// logging all belong to the implementation.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, title: &str, body: &str);
}
