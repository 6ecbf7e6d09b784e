//! Error types for the renewal scheduler.

use std::time::Duration;

use thiserror::Error;

/// Certificate store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused to answer
    #[error("certificate store unavailable: {0}")]
    Unavailable(String),

    /// The listing did not complete within the configured bound
    #[error("certificate store timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read certificate inventory: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed certificate inventory: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Issuer failures for a single renewal
#[derive(Debug, Error)]
pub enum IssuerError {
    /// The issuance service answered but declined the renewal
    #[error("renewal rejected: {0}")]
    Rejected(String),

    /// The request never got a usable answer
    #[error("issuer transport error: {0}")]
    Transport(String),

    #[error("renewal timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for IssuerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IssuerError::Transport(format!("request timed out: {}", err))
        } else {
            IssuerError::Transport(err.to_string())
        }
    }
}

/// Wake source failures
#[derive(Debug, Error)]
pub enum ClockError {
    /// Every producer that could wake the scanner is gone
    #[error("wake source closed")]
    Closed,
}

/// Errors that stop the scheduler
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The store failed and the configured policy does not tolerate it
    #[error("certificate store unavailable after {consecutive_failures} consecutive failed cycle(s): {source}")]
    StoreUnavailable {
        consecutive_failures: u64,
        #[source]
        source: StoreError,
    },

    #[error("wake source failed: {0}")]
    Clock(#[from] ClockError),
}

/// Manual trigger failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    /// The scanner has stopped
    #[error("scheduler is not running")]
    Closed,

    /// Too many triggers are already waiting
    #[error("trigger queue is full")]
    Full,
}
