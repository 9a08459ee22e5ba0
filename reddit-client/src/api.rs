use crate::metrics::{MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use notifier_core::{CoreError, RedditApiError, RedditPost};
use reqwest::{redirect::Policy, Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use url::Url;

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Largest page Reddit serves for a listing.
pub const NEW_POSTS_LIMIT: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

/// The submission fields the notifier reads. Reddit sends many more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditSubredditData {
    pub display_name: String,
    #[serde(default)]
    pub subreddit_type: String,
    #[serde(default)]
    pub subscribers: Option<u64>,
    #[serde(default)]
    pub over18: bool,
}

/// Builds the HTTP client shared by the API and token requests. Redirects
/// are not followed: Reddit answers a request for a missing subreddit with a
/// redirect to its search page.
pub fn build_http_client(user_agent: &str) -> Result<Client, CoreError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .redirect(Policy::none())
        .build()
        .map_err(CoreError::Network)
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
}

impl RedditApiClient {
    pub fn new(user_agent: &str) -> Result<Self, CoreError> {
        Ok(Self::with_http_client(build_http_client(user_agent)?))
    }

    pub fn with_http_client(http_client: Client) -> Self {
        let rate_config = RateLimitConfig::reddit_oauth();

        Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(rate_config)),
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    fn endpoint_url(&self, endpoint: &str, query_params: &[(&str, &str)]) -> Result<Url, CoreError> {
        let mut url = Url::parse(REDDIT_API_BASE)
            .and_then(|base| base.join(endpoint))
            .map_err(|e| CoreError::InvalidInput {
                message: format!("invalid endpoint {}: {}", endpoint, e),
            })?;
        if !query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(query_params);
        }
        Ok(url)
    }

    /// Sends one rate limited request. Only transport failures are errors
    /// here; status handling is left to [`check_status`] so callers can give
    /// some statuses their own meaning.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Response, CoreError> {
        let url = self.endpoint_url(endpoint, query_params)?;

        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, permit.queue_wait_time
        );

        let start_time = Instant::now();
        let result = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(access_token)
            .send()
            .await;
        let response_time = start_time.elapsed();

        let (status_code, error_type) = match &result {
            Ok(response) => {
                self.rate_limiter.update_from_headers(response.headers()).await;
                let status = response.status();
                (Some(status.as_u16()), status_error_type(status))
            }
            Err(e) if e.is_timeout() => (None, Some("timeout".to_string())),
            Err(_) => (None, Some("network_error".to_string())),
        };

        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint.to_string(),
                method: method.to_string(),
                status_code,
                response_time,
                success: error_type.is_none(),
                rate_limited: status_code == Some(429),
                error_type,
            })
            .await;

        result.map_err(|e| {
            error!("Network error for {} {}: {}", method, endpoint, e);
            if e.is_timeout() {
                CoreError::RedditApi(RedditApiError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })
    }

    pub async fn get_new_posts(
        &self,
        access_token: &str,
        subreddits: &str,
        limit: u32,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/new", subreddits);
        let limit = limit.min(NEW_POSTS_LIMIT).to_string();
        let params = [("limit", limit.as_str()), ("raw_json", "1")];

        let response = self
            .send(Method::GET, &endpoint, access_token, &params)
            .await?;
        let response = check_status(response, &endpoint)?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse new posts: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse new posts for r/{}", subreddits),
            })
        })?;

        debug!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddits
        );
        Ok(listing)
    }

    /// Fetches `/r/{name}/about`. A redirect, a 404 or anything that is not a
    /// subreddit thing means the subreddit does not exist.
    pub async fn get_subreddit_about(
        &self,
        access_token: &str,
        subreddit: &str,
    ) -> Result<RedditSubredditData, CoreError> {
        let endpoint = format!("/r/{}/about", subreddit);
        let not_found = || {
            CoreError::RedditApi(RedditApiError::SubredditNotFound {
                subreddit: subreddit.to_string(),
            })
        };

        let response = self
            .send(Method::GET, &endpoint, access_token, &[])
            .await?;
        let status = response.status();
        if status.is_redirection() || status == StatusCode::NOT_FOUND {
            debug!("r/{} answered {}", subreddit, status);
            return Err(not_found());
        }
        let response = check_status(response, &endpoint)?;

        let about: RedditListingChild<serde_json::Value> = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit info: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse info for r/{}", subreddit),
            })
        })?;

        if about.kind != "t5" {
            debug!("r/{} returned a {} instead of a subreddit", subreddit, about.kind);
            return Err(not_found());
        }

        serde_json::from_value(about.data).map_err(|e| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Malformed info for r/{}: {}", subreddit, e),
            })
        })
    }

    pub async fn get_metrics(&self) -> crate::metrics::ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn metrics_summary(&self) -> String {
        self.metrics.summary().await
    }

    pub async fn get_rate_limit_status(&self) -> crate::rate_limiter::RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }

    pub async fn reset_metrics(&self) {
        self.metrics.reset_metrics().await;
    }
}

fn status_error_type(status: StatusCode) -> Option<String> {
    if status.is_success() {
        return None;
    }
    let label = match status.as_u16() {
        429 => "rate_limited",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not_found",
        300..=399 => "redirect",
        500..=599 => "server_error",
        _ => "client_error",
    };
    Some(label.to_string())
}

/// Maps a non-success status to the matching API error.
pub fn check_status(response: Response, endpoint: &str) -> Result<Response, CoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    error!("Request failed with status: {} for {}", status, endpoint);

    let error = match status.as_u16() {
        429 => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => RedditApiError::InvalidResponse {
            details: format!("{} not found", endpoint),
        },
        code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
        code => RedditApiError::InvalidResponse {
            details: format!("unexpected status {} for {}", code, endpoint),
        },
    };

    Err(CoreError::RedditApi(error))
}

impl From<RedditPostData> for RedditPost {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            title: post_data.title,
            content: if post_data.is_self && !post_data.selftext.is_empty() {
                Some(post_data.selftext)
            } else {
                None
            },
            subreddit: post_data.subreddit,
            url: post_data.url,
            permalink: post_data.permalink,
            created_utc: post_data.created_utc as i64,
        }
    }
}

impl RedditListing<RedditPostData> {
    /// Posts in listing order, newest first for `/new`.
    pub fn into_posts(self) -> Vec<RedditPost> {
        self.data
            .children
            .into_iter()
            .filter(|child| child.kind == "t3")
            .map(|child| child.data.into())
            .collect()
    }
}
