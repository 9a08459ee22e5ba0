//! The long-running loop that turns a feed subscription into notifications.
//!
//! ```text
//! Starting ──► Streaming ──(error or end)──► Backoff ──(30s)──► Streaming ...
//!    │             │                            │
//!    │ not found   └──────── interrupt ─────────┴──► Stopped
//!    ▼
//!  Err
//! ```

use chrono::{DateTime, Local};
use futures::StreamExt;
use notifier_core::{
    CoreError, DedupTracker, ErrorRecovery, FeedSource, NotificationSink, RecoveryPhase,
    RecoveryStrategy, RedditPost, RuntimeSettings, SubredditFilter, STREAM_BACKOFF,
};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Pause before reopening a failed subscription.
    pub backoff: Duration,
    /// Print every match to stdout.
    pub echo_matches: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            backoff: STREAM_BACKOFF,
            echo_matches: false,
        }
    }
}

impl From<&RuntimeSettings> for CoordinatorSettings {
    fn from(settings: &RuntimeSettings) -> Self {
        Self {
            echo_matches: settings.echo_matches,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Starting,
    Streaming,
    Backoff,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub posts_received: u64,
    pub duplicates_skipped: u64,
    pub unknown_feed: u64,
    pub matches: u64,
    pub reconnects: u64,
}

impl fmt::Display for StreamStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} posts received, {} matched, {} duplicates, {} from unknown subreddits, {} reconnects",
            self.posts_received,
            self.matches,
            self.duplicates_skipped,
            self.unknown_feed,
            self.reconnects
        )
    }
}

enum Next {
    Item(Option<Result<RedditPost, CoreError>>),
    Shutdown,
}

pub struct StreamCoordinator<S, N> {
    source: S,
    sink: N,
    feeds: Vec<String>,
    filters: HashMap<String, SubredditFilter>,
    dedup: DedupTracker,
    settings: CoordinatorSettings,
    state: CoordinatorState,
    stats: StreamStats,
}

impl<S: FeedSource, N: NotificationSink> StreamCoordinator<S, N> {
    pub fn new(source: S, sink: N, filters: Vec<SubredditFilter>) -> Self {
        let feeds = filters.iter().map(|f| f.name.clone()).collect();
        let filters = filters
            .into_iter()
            .map(|f| (f.name.to_lowercase(), f))
            .collect();

        Self {
            source,
            sink,
            feeds,
            filters,
            dedup: DedupTracker::new(),
            settings: CoordinatorSettings::default(),
            state: CoordinatorState::Starting,
            stats: StreamStats::default(),
        }
    }

    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Starts from an existing set of processed ids instead of an empty one.
    pub fn with_dedup(mut self, dedup: DedupTracker) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    pub fn feeds(&self) -> &[String] {
        &self.feeds
    }

    /// Checks every configured subreddit once. A missing one is fatal, any
    /// other error is logged and ignored.
    pub async fn validate_feeds(&mut self) -> Result<(), CoreError> {
        self.state = CoordinatorState::Starting;

        for feed in &self.feeds {
            let error = match self.source.check_feed_exists(feed).await {
                Ok(()) => {
                    debug!("r/{} exists", feed);
                    continue;
                }
                Err(error) => error,
            };

            match ErrorRecovery::determine_strategy(
                &error,
                RecoveryPhase::Startup,
                self.settings.backoff,
            ) {
                RecoveryStrategy::Fail => {
                    error!("Invalid Subreddit: {}", feed);
                    return Err(error);
                }
                _ => warn!("Reddit API error while checking r/{}: {}", feed, error),
            }
        }

        Ok(())
    }

    /// Validates the feeds, then streams until `shutdown` resolves.
    ///
    /// Returns `Err` only for a fatal startup failure. Stream failures are
    /// retried forever after a fixed pause.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<StreamStats, CoreError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let validated = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            result = self.validate_feeds() => Some(result),
        };
        match validated {
            None => return Ok(self.stop()),
            Some(result) => result?,
        }

        loop {
            self.state = CoordinatorState::Streaming;
            info!("Streaming new posts from r/{}", self.feeds.join("+"));
            let mut stream = self.source.open_combined_subscription(&self.feeds);

            let failure = loop {
                let next = tokio::select! {
                    biased;
                    _ = &mut shutdown => Next::Shutdown,
                    item = stream.next() => Next::Item(item),
                };

                match next {
                    Next::Shutdown => return Ok(self.stop()),
                    // Notification is awaited here, outside the select, so
                    // an interrupt never cuts a delivery short.
                    Next::Item(Some(Ok(post))) => self.process_post(post).await,
                    Next::Item(Some(Err(error))) => break error,
                    Next::Item(None) => {
                        break CoreError::SubscriptionClosed {
                            reason: "stream ended".to_string(),
                        }
                    }
                }
            };
            drop(stream);

            let delay = match ErrorRecovery::determine_strategy(
                &failure,
                RecoveryPhase::Streaming,
                self.settings.backoff,
            ) {
                RecoveryStrategy::Backoff(delay) => delay,
                RecoveryStrategy::Proceed => Duration::ZERO,
                RecoveryStrategy::Fail => return Err(failure),
            };

            self.state = CoordinatorState::Backoff;
            error!("Reddit API error: {}", failure);
            warn!("Pausing for {} seconds...", delay.as_secs());

            tokio::select! {
                biased;
                _ = &mut shutdown => return Ok(self.stop()),
                _ = sleep(delay) => {}
            }

            self.stats.reconnects += 1;
            info!("Reconnecting to Reddit (attempt {})", self.stats.reconnects);
        }
    }

    fn stop(&mut self) -> StreamStats {
        self.state = CoordinatorState::Stopped;
        info!("Stream stopped: {}", self.stats);
        self.stats.clone()
    }

    async fn process_post(&mut self, post: RedditPost) {
        self.stats.posts_received += 1;

        if self.dedup.seen(&post.id) {
            self.stats.duplicates_skipped += 1;
            trace!("Skipping already processed post {}", post.id);
            return;
        }

        let feed = post.subreddit.to_lowercase();
        match self.filters.get(&feed).map(|filter| filter.matches(&post.title)) {
            None => {
                self.stats.unknown_feed += 1;
                warn!(
                    "Post {} is from r/{}, which is not configured; skipping",
                    post.id, post.subreddit
                );
            }
            Some(false) => trace!("r/{}: no match for {:?}", feed, post.title),
            Some(true) => {
                self.stats.matches += 1;
                let link = post.link();
                info!("Match in r/{}: {}", feed, post.title);
                self.sink.send(&post.title, &link).await;

                if self.settings.echo_matches {
                    println!("{}", echo_line(&post, &feed));
                }
            }
        }

        self.dedup.mark_seen(&post.id);
    }
}

/// `<local time> r/<feed>: <title>` and the link on a second line.
pub fn echo_line(post: &RedditPost, feed: &str) -> String {
    let created = DateTime::from_timestamp(post.created_utc, 0)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| post.created_utc.to_string());

    format!("{} r/{}: {}\n{}", created, feed, post.title, post.link())
}
