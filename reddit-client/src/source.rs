use crate::stream::{submission_stream, NewPostsFetcher};
use crate::RedditClient;
use async_trait::async_trait;
use notifier_core::{CoreError, FeedSource, PostStream, RedditPost};

#[async_trait]
impl NewPostsFetcher for RedditClient {
    async fn fetch_new(&self, subreddits: &str, limit: u32) -> Result<Vec<RedditPost>, CoreError> {
        self.fetch_new_posts(subreddits, limit).await
    }
}

#[async_trait]
impl FeedSource for RedditClient {
    async fn check_feed_exists(&self, feed: &str) -> Result<(), CoreError> {
        self.check_subreddit(feed).await
    }

    /// Reddit serves several subreddits as one listing under `a+b+c`.
    fn open_combined_subscription(&self, feeds: &[String]) -> PostStream {
        submission_stream(self.clone(), feeds.join("+"))
    }
}
