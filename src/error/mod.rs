//! Error types for the parley client.
//!
//! Errors are split by the layer that produces them:
//!
//! - [`StreamError`]: failures of the streaming transport, delivered to a
//!   [`StreamHandler`](crate::sse::StreamHandler) through `on_error`
//! - [`ApiError`]: failures of HTTP calls made by [`ApiClient`](crate::api::ApiClient)
//! - [`StorageError`]: failures of the durable key/value store
//!
//! | Error | Retryable | Requires re-login |
//! |-------|-----------|-------------------|
//! | `StreamError::Transport` | Yes | No |
//! | `StreamError::Timeout` | Yes | No |
//! | `ApiError::Network` | Yes | No |
//! | `ApiError::Server` (5xx) | Yes | No |
//! | `ApiError::Unauthorized` | No | Yes |
//! | `ApiError::StreamInProgress` | No | No |
//!
//! Nothing in the client retries on its own. The table only tells callers
//! what a retry could achieve.

mod api;
mod storage;
mod stream;

pub use api::ApiError;
pub use storage::StorageError;
pub use stream::StreamError;
