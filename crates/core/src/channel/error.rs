//! Error types for the channel module.

use thiserror::Error;

/// Errors reported by a messaging channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The platform rejected the request.
    #[error("API error: {0}")]
    Api(String),

    /// The request could not reach the platform.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The platform answered with something we could not parse.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// I/O error while preparing an upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout)
    }
}
