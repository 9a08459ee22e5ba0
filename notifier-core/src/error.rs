use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Subscription closed: {reason}")]
    SubscriptionClosed { reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Subreddit not found: {subreddit}")]
    SubredditNotFound { subreddit: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing config file: {path}")]
    FileNotFound { path: String },

    #[error("Invalid config: failed to parse toml, line {line}, column {column}: {details}")]
    InvalidFormat {
        line: usize,
        column: usize,
        details: String,
    },

    #[error("Invalid config: missing {field} config")]
    MissingField { field: String },

    #[error("Invalid config: '{field}' {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid config: {reason}")]
    ValidationFailed { reason: String },

    #[error("Permission denied accessing config: {path}")]
    PermissionDenied { path: String },
}

#[derive(Error, Debug, Clone)]
pub enum NotificationError {
    #[error("Unsupported notification descriptor: {descriptor}")]
    UnsupportedDescriptor { descriptor: String },

    #[error("{channel} delivery failed: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("{channel} rate limit exceeded after {attempts} attempts")]
    RateLimited { channel: String, attempts: u32 },
}
