//! Resilient upload engine shared by the storage backend clients.
//!
//! Large video uploads to rate-limited APIs fail in boring, repetitive
//! ways: slow links blow fixed deadlines, pooled connections get reset
//! mid-PUT, transient 5xx responses come and go. This crate packages the
//! machinery both backends need to push through that: a byte-counting
//! progress reader, size-scaled deadlines, a fixed-budget retry loop, and
//! an ordered ladder of increasingly conservative transport strategies.

mod progress;
mod retry;
mod strategy;
mod timeout;
mod transport;

pub use progress::{ProgressReader, ProgressState};
pub use retry::RetryPolicy;
pub use strategy::{Strategy, StrategyLadder};
pub use timeout::TimeoutPolicy;
pub use transport::Transport;

use std::time::Duration;

/// Errors produced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The local source file could not be opened or stat'd.
    #[error("source file unavailable: {0}")]
    Source(#[from] std::io::Error),

    /// The metadata request for a signed upload URL failed.
    #[error("upload URL resolution failed: {0}")]
    Resolution(String),

    /// Network-level failure before a response was received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The computed request deadline elapsed.
    #[error("upload deadline of {limit:?} exceeded")]
    Timeout { limit: Duration },

    /// The server answered with a non-success status.
    #[error("upload rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The retry budget for one strategy is spent.
    #[error("upload failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<TransferError>,
    },

    /// Every strategy in the ladder failed.
    #[error("all {count} upload strategies failed: {last}")]
    AllStrategiesFailed {
        count: usize,
        #[source]
        last: Box<TransferError>,
    },
}

impl TransferError {
    /// Classifies a reqwest failure, keeping deadline exceedance apart
    /// from other transport errors.
    pub fn from_request(err: reqwest::Error, limit: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { limit }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_carries_status_and_body() {
        let err = TransferError::Rejected {
            status: 413,
            body: "quota exceeded".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("413"), "message should carry status: {msg}");
        assert!(msg.contains("quota exceeded"));
    }

    #[test]
    fn retries_exhausted_preserves_cause() {
        let err = TransferError::RetriesExhausted {
            attempts: 3,
            last: Box::new(TransferError::Rejected {
                status: 401,
                body: "bad token".into(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("401"), "last cause should survive: {msg}");

        // The cause is also reachable through the source chain.
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert!(source.is_some_and(|s| s.contains("401")));
    }

    #[test]
    fn timeout_mentions_limit() {
        let err = TransferError::Timeout {
            limit: Duration::from_secs(1500),
        };
        assert!(err.to_string().contains("1500"));
    }
}
