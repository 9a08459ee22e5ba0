//! Reddit access for the notifier: app-only OAuth2, a rate limited API
//! client and a polling stream of new submissions.

pub mod api;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;
pub mod source;
pub mod stream;


use api::{RedditApiClient, NEW_POSTS_LIMIT};
use notifier_core::{CoreError, RedditApiError, RedditCredentials, RedditPost};
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    TokenResponse, TokenUrl,
};
use retry::{RetryConfig, RetryExecutor};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

pub use stream::{submission_stream, NewPostsFetcher};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are refreshed this long before Reddit would reject them.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl RedditOAuth2Config {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self {
            client_id,
            client_secret,
            user_agent,
        }
    }

    pub fn from_credentials(credentials: &RedditCredentials) -> Self {
        Self::new(
            credentials.client_id.clone(),
            credentials.client_secret.clone(),
            credentials.user_agent.clone(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn needs_refresh(&self) -> bool {
        SystemTime::now() + TOKEN_REFRESH_MARGIN >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { token: RedditToken },
    TokenExpired { token: RedditToken },
}

/// Cheap to clone; clones share the token, the rate limiter and metrics.
#[derive(Clone)]
pub struct RedditClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: RedditOAuth2Config,
    oauth_client: BasicClient,
    api: RedditApiClient,
    auth_state: Mutex<AuthState>,
    token_retry: RetryExecutor,
    request_retry: RetryExecutor,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| CoreError::Internal {
            message: format!("Invalid auth URL: {}", e),
        })?;
        let token_url =
            TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| CoreError::Internal {
                message: format!("Invalid token URL: {}", e),
            })?;

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::BasicAuth);

        let api = RedditApiClient::new(&config.user_agent)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                oauth_client,
                api,
                auth_state: Mutex::new(AuthState::NotAuthenticated),
                token_retry: RetryExecutor::new(RetryConfig::reddit_auth()),
                request_retry: RetryExecutor::new(RetryConfig::reddit()),
            }),
        })
    }

    pub fn config(&self) -> &RedditOAuth2Config {
        &self.inner.config
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.inner.api
    }

    /// Requests a fresh app-only token with the client credentials grant.
    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        let token = self
            .inner
            .token_retry
            .execute("reddit_access_token", || self.request_token())
            .await?;

        info!(
            "Authenticated with Reddit, token valid until {:?}",
            token.expires_at
        );
        self.set_token(token.clone());
        Ok(token)
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        let http_client = self.inner.api.http_client().clone();
        let response = self
            .inner
            .oauth_client
            .exchange_client_credentials()
            .request_async(|request| oauth_http_client(http_client, request))
            .await
            .map_err(token_error)?;

        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope,
        })
    }

    /// A token that is good for at least another minute, fetching a new one
    /// when needed.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let AuthState::Authenticated { token } = self.get_auth_state() {
            if !token.needs_refresh() {
                return Ok(token.access_token);
            }
            debug!("Access token is about to expire, refreshing");
        }
        Ok(self.authenticate().await?.access_token)
    }

    pub fn set_token(&self, token: RedditToken) {
        let state = if token.needs_refresh() {
            AuthState::TokenExpired { token }
        } else {
            AuthState::Authenticated { token }
        };
        *self.lock_state() = state;
    }

    /// Forces the next request to fetch a new token.
    pub fn invalidate_token(&self) {
        let mut state = self.lock_state();
        if let AuthState::Authenticated { token } = &*state {
            let token = token.clone();
            *state = AuthState::TokenExpired { token };
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.lock_state(), AuthState::Authenticated { token } if !token.needs_refresh())
    }

    pub fn needs_refresh(&self) -> bool {
        match &*self.lock_state() {
            AuthState::NotAuthenticated => false,
            AuthState::Authenticated { token } => token.needs_refresh(),
            AuthState::TokenExpired { .. } => true,
        }
    }

    pub fn get_auth_state(&self) -> AuthState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.inner
            .auth_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs an authenticated call, dropping the token if Reddit rejects it.
    async fn with_token<F, Fut, T>(&self, call: F) -> Result<T, CoreError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let token = self.access_token().await?;
        let result = call(token).await;
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            warn!("Reddit rejected the access token, it will be refreshed");
            self.invalidate_token();
        }
        result
    }

    /// `SubredditNotFound` when the subreddit does not exist.
    pub async fn check_subreddit(&self, name: &str) -> Result<(), CoreError> {
        let about = self
            .inner
            .request_retry
            .execute("subreddit_about", || {
                self.with_token(|token| async move {
                    self.inner.api.get_subreddit_about(&token, name).await
                })
            })
            .await?;

        debug!(
            "r/{} exists ({} subscribers)",
            about.display_name,
            about.subscribers.unwrap_or_default()
        );
        Ok(())
    }

    /// Newest first, at most 100 posts across the `+` joined subreddits.
    pub async fn fetch_new_posts(
        &self,
        subreddits: &str,
        limit: u32,
    ) -> Result<Vec<RedditPost>, CoreError> {
        self.with_token(|token| async move {
            let listing = self
                .inner
                .api
                .get_new_posts(&token, subreddits, limit.min(NEW_POSTS_LIMIT))
                .await?;
            Ok(listing.into_posts())
        })
        .await
    }

    pub async fn get_api_metrics(&self) -> metrics::ApiMetrics {
        self.inner.api.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> rate_limiter::RateLimitStatus {
        self.inner.api.get_rate_limit_status().await
    }
}

/// Sends oauth2's token request through the reqwest client so it carries the
/// configured user agent. Reddit rejects requests without one.
async fn oauth_http_client(
    client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn token_error(error: RequestTokenError<reqwest::Error, BasicErrorResponse>) -> CoreError {
    match error {
        RequestTokenError::ServerResponse(response) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: response.to_string(),
            })
        }
        RequestTokenError::Request(e) if e.is_timeout() => {
            CoreError::RedditApi(RedditApiError::RequestTimeout)
        }
        RequestTokenError::Request(e) => CoreError::Network(e),
        RequestTokenError::Parse(e, body) => {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!(
                    "Unexpected token response ({}): {}",
                    e,
                    String::from_utf8_lossy(&body)
                ),
            })
        }
        RequestTokenError::Other(reason) => {
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
        }
    }
}
