//! Error types for acquisition operations

use std::fmt;
use std::time::Duration;

/// Result type alias for collector operations
pub type CollectorResult<T> = Result<T, CollectorError>;

/// Errors that can occur while talking to peers, the actor directory or the bus
#[derive(Debug)]
pub enum CollectorError {
    /// Connection refused, reset, DNS failure, ...
    Transport(String),

    /// The call did not finish within its deadline
    Timeout(Duration),

    /// The remote side answered but reported a failure
    BadStatus { code: i64, message: String },

    /// Payload could not be decoded
    Decode(String),

    /// Address or port of a peer cannot be used to build a connection
    InvalidAddress(String),

    /// Subscribing to a topic or pattern failed
    Subscribe(String),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorError::Transport(msg) => write!(f, "transport error: {}", msg),
            CollectorError::Timeout(deadline) => {
                write!(f, "deadline of {}ms exceeded", deadline.as_millis())
            }
            CollectorError::BadStatus { code, message } => {
                write!(f, "remote returned status {}: {}", code, message)
            }
            CollectorError::Decode(msg) => write!(f, "decode error: {}", msg),
            CollectorError::InvalidAddress(msg) => write!(f, "invalid peer address: {}", msg),
            CollectorError::Subscribe(msg) => write!(f, "subscription failed: {}", msg),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CollectorError::Decode(err.to_string())
        } else {
            CollectorError::Transport(err.to_string())
        }
    }
}

/// Run `fut` with a deadline, mapping expiry to [`CollectorError::Timeout`]
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> CollectorResult<T>
where
    F: std::future::Future<Output = CollectorResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(CollectorError::Timeout(deadline)),
    }
}
