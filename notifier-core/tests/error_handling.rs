use notifier_core::{
    ConfigError, CoreError, ErrorExt, ErrorRecovery, ErrorReporter, FailureClass,
    NotificationError, RedditApiError,
};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "reddit -> client".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    let notify_error = CoreError::Notification(NotificationError::DeliveryFailed {
        channel: "discord".to_string(),
        reason: "HTTP 500".to_string(),
    });
    assert_eq!(notify_error.error_code(), "NOTIFICATION");
}

#[test]
fn test_retryable_errors() {
    let retryable_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let closed = CoreError::SubscriptionClosed {
        reason: "listing ended".to_string(),
    };
    assert!(closed.is_retryable());

    let non_retryable_error = CoreError::Config(ConfigError::MissingField {
        field: "reddit".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let timeout_error = CoreError::Timeout { seconds: 30 };
    assert_eq!(timeout_error.retry_after(), Some(Duration::from_secs(30)));
}

#[test]
fn test_user_friendly_messages() {
    let not_found = CoreError::RedditApi(RedditApiError::SubredditNotFound {
        subreddit: "nosuchsub".to_string(),
    });
    assert_eq!(not_found.user_friendly_message(), "Invalid Subreddit: nosuchsub");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "reddit -> secret".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("reddit -> secret"));
}

#[test]
fn test_config_error_display_matches_operator_messages() {
    let missing = ConfigError::MissingField {
        field: "reddit -> agent".to_string(),
    };
    assert_eq!(
        missing.to_string(),
        "Invalid config: missing reddit -> agent config"
    );

    let file = ConfigError::FileNotFound {
        path: "config.toml".to_string(),
    };
    assert_eq!(file.to_string(), "Missing config file: config.toml");
}

#[test]
fn test_classification() {
    let not_found = CoreError::RedditApi(RedditApiError::SubredditNotFound {
        subreddit: "nosuchsub".to_string(),
    });
    assert_eq!(ErrorRecovery::classify(&not_found), FailureClass::Fatal);

    let server = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
    assert_eq!(ErrorRecovery::classify(&server), FailureClass::Transient);
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::RedditApi(RedditApiError::InvalidToken);

    // This test just ensures the methods don't panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
