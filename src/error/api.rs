//! HTTP API errors.

use thiserror::Error;

use super::StorageError;

/// Errors returned by [`ApiClient`](crate::api::ApiClient) calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status other than 401.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The server answered 401. Stored credentials have already been
    /// invalidated by the time this is returned.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Another chat stream is still running on this client.
    #[error("A reply is already streaming on this client")]
    StreamInProgress,

    /// A success response body did not match the expected shape.
    #[error("Invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing credentials failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Whether the caller must log in again before retrying.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Whether the same request could succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Network connection failed, please check your network settings.".to_string()
            }
            ApiError::Server { message, .. } => message.clone(),
            ApiError::Unauthorized { message } => {
                format!("{}. Please log in again.", message)
            }
            ApiError::StreamInProgress => {
                "Please wait for the current reply to finish before sending another message."
                    .to_string()
            }
            ApiError::Json(_) => "Received an unexpected response from the server.".to_string(),
            ApiError::Storage(e) => format!("Could not access local data: {}", e),
        }
    }
}
