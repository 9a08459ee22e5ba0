//! Polling stream over `/r/{a+b+c}/new`.
//!
//! Reddit has no push API for submissions, so the stream re-reads the newest
//! page and yields whatever it has not seen yet, oldest first. Quiet polls
//! back off exponentially up to [`MAX_POLL_DELAY`].

use crate::api::NEW_POSTS_LIMIT;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use notifier_core::{CoreError, PostStream, RedditPost};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace};

/// Ids remembered by one stream. Must exceed the page size so a full page
/// of already yielded posts is still recognised.
pub const SEEN_CAPACITY: usize = 301;

/// Longest pause between two polls that found nothing new.
pub const MAX_POLL_DELAY: Duration = Duration::from_secs(16);

/// One page of the newest posts, newest first.
#[async_trait]
pub trait NewPostsFetcher: Send + Sync {
    async fn fetch_new(&self, subreddits: &str, limit: u32) -> Result<Vec<RedditPost>, CoreError>;
}

/// Insertion ordered set that forgets its oldest entry once full.
#[derive(Debug)]
pub struct BoundedSet {
    capacity: usize,
    order: VecDeque<String>,
    items: HashSet<String>,
}

impl BoundedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            items: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.contains(item)
    }

    pub fn insert(&mut self, item: &str) {
        if self.items.contains(item) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.items.remove(&oldest);
            }
        }
        self.order.push_back(item.to_string());
        self.items.insert(item.to_string());
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Doubling delay with a little jitter, starting at one second.
#[derive(Debug)]
pub struct ExponentialCounter {
    base: f64,
    max: f64,
}

impl ExponentialCounter {
    pub fn new(max: Duration) -> Self {
        Self {
            base: 1.0,
            max: max.as_secs_f64(),
        }
    }

    /// Current delay, then doubles the base for the next call.
    pub fn next_delay(&mut self) -> Duration {
        let max_jitter = self.base / 16.0;
        let value = self.base + fastrand::f64() * max_jitter - max_jitter / 2.0;
        self.base = (self.base * 2.0).min(self.max);
        Duration::from_secs_f64(value)
    }

    pub fn reset(&mut self) {
        self.base = 1.0;
    }
}

struct StreamState<F> {
    fetcher: F,
    subreddits: String,
    seen: BoundedSet,
    counter: ExponentialCounter,
    pending: VecDeque<RedditPost>,
    primed: bool,
    idle: bool,
    finished: bool,
}

impl<F: NewPostsFetcher> StreamState<F> {
    /// Records a page and queues the posts not seen before, oldest first.
    /// The first page only primes the seen set.
    fn absorb(&mut self, page: Vec<RedditPost>) {
        let mut found = false;
        for post in page.into_iter().rev() {
            if self.seen.contains(&post.id) {
                continue;
            }
            found = true;
            self.seen.insert(&post.id);
            if self.primed {
                self.pending.push_back(post);
            }
        }

        if !self.primed {
            debug!(
                "Skipping {} existing posts in r/{}",
                self.seen.len(),
                self.subreddits
            );
            self.primed = true;
        }

        if found {
            self.counter.reset();
        }
        self.idle = !found;
    }
}

/// Endless stream of posts created after the first poll. The first error is
/// yielded and ends the stream; callers reopen it.
pub fn submission_stream<F>(fetcher: F, subreddits: String) -> PostStream
where
    F: NewPostsFetcher + 'static,
{
    let state = StreamState {
        fetcher,
        subreddits,
        seen: BoundedSet::new(SEEN_CAPACITY),
        counter: ExponentialCounter::new(MAX_POLL_DELAY),
        pending: VecDeque::new(),
        primed: false,
        idle: false,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }
            if let Some(post) = state.pending.pop_front() {
                return Some((Ok(post), state));
            }

            if state.idle {
                let delay = state.counter.next_delay();
                trace!("No new posts in r/{}, next poll in {:?}", state.subreddits, delay);
                sleep(delay).await;
            }

            match state.fetcher.fetch_new(&state.subreddits, NEW_POSTS_LIMIT).await {
                Ok(page) => state.absorb(page),
                Err(error) => {
                    state.finished = true;
                    return Some((Err(error), state));
                }
            }
        }
    })
    .boxed()
}
