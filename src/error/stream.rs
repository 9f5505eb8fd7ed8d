//! Streaming transport errors.
//!
//! Malformed event payloads are not errors: the decoder logs and skips them.
//! Only failures that end the stream show up here.

use std::time::Duration;

use thiserror::Error;

/// Reasons a chat stream was abandoned before completing normally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Reading the response body failed.
    #[error("Stream read failed: {message}")]
    Transport { message: String },

    /// No bytes arrived within the configured read timeout.
    #[error("No data received for {duration_secs} seconds")]
    Timeout { duration_secs: u64 },
}

impl StreamError {
    /// Build a transport error from anything displayable, typically a
    /// `reqwest::Error` yielded by the body stream.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        StreamError::Transport {
            message: err.to_string(),
        }
    }

    /// Build a timeout error, rounding partial seconds up so a sub-second
    /// limit never reads as zero.
    pub fn timeout(limit: Duration) -> Self {
        let partial = u64::from(limit.subsec_nanos() > 0);
        StreamError::Timeout {
            duration_secs: limit.as_secs().saturating_add(partial),
        }
    }

    /// Whether sending the same message again could succeed.
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Transport { .. } => {
                "The connection was interrupted while the reply was streaming. Please try again."
                    .to_string()
            }
            StreamError::Timeout { duration_secs } => format!(
                "No response from server for {} seconds. The connection may have been lost.",
                duration_secs
            ),
        }
    }
}
