//! Error recovery strategies for the feed monitor.
//!
//! Every error the feed source can raise falls into one of two classes:
//! fatal errors end the process, transient errors are recovered locally.
//! What "recovered" means depends on where the error surfaced: during the
//! startup existence check a transient error is logged and ignored, while
//! inside the stream loop every error leads to a pause and a reconnect.

use crate::{CoreError, ErrorExt, RedditApiError};
use std::time::Duration;
use tracing::info;

/// Fixed pause before reopening a failed subscription.
pub const STREAM_BACKOFF: Duration = Duration::from_secs(30);

/// Classification consumed by the stream coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Terminates the process
    Fatal,
    /// Recovered locally, never surfaced beyond a log line
    Transient,
}

/// Where in the coordinator lifecycle an error was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    /// One-time feed existence check
    Startup,
    /// Consuming the combined subscription
    Streaming,
}

/// Recovery strategy for handling errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Log the error and carry on as if it had not happened
    Proceed,
    /// Sleep for the given delay, then reopen the subscription
    Backoff(Duration),
    /// Fail immediately
    Fail,
}

impl RecoveryStrategy {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecoveryStrategy::Fail)
    }
}

/// Error recovery handler that provides strategies for different error types
pub struct ErrorRecovery;

impl ErrorRecovery {
    /// Only a missing feed or a broken configuration is fatal.
    pub fn classify(error: &CoreError) -> FailureClass {
        match error {
            CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }) => FailureClass::Fatal,
            CoreError::Config(_) => FailureClass::Fatal,
            _ => FailureClass::Transient,
        }
    }

    /// Determine the appropriate recovery strategy for a given error
    pub fn determine_strategy(
        error: &CoreError,
        phase: RecoveryPhase,
        backoff: Duration,
    ) -> RecoveryStrategy {
        match phase {
            RecoveryPhase::Startup => match Self::classify(error) {
                FailureClass::Fatal => RecoveryStrategy::Fail,
                FailureClass::Transient => RecoveryStrategy::Proceed,
            },
            // A feed that vanished after a successful startup check is
            // handled like any other upstream failure.
            RecoveryPhase::Streaming => {
                if let Some(hint) = error.retry_after() {
                    if hint > backoff {
                        info!(
                            "Upstream asked for {:?}, pausing for fixed {:?} instead",
                            hint, backoff
                        );
                    }
                }
                RecoveryStrategy::Backoff(backoff)
            }
        }
    }
}
