//! Client configuration.
//!
//! Use the builder methods to customize, or [`ClientConfig::from_env`] to
//! pick up `PARLEY_*` overrides:
//!
//! | Variable                     | Field                 |
//! |------------------------------|-----------------------|
//! | `PARLEY_API_URL`             | `base_url`            |
//! | `PARLEY_MODEL`               | `model`               |
//! | `PARLEY_TIMEOUT_SECS`        | `request_timeout`     |
//! | `PARLEY_STREAM_TIMEOUT_SECS` | `stream_read_timeout` |
//! | `PARLEY_DATA_DIR`            | `data_dir`            |

use std::path::PathBuf;
use std::time::Duration;

use crate::models::DEFAULT_MODEL;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8002/api";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DATA_DIR_NAME: &str = ".parley";

/// Settings for [`ApiClient`](crate::api::ApiClient) and the local state.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use parley::config::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_base_url("http://chat.internal/api/")
///     .with_stream_read_timeout(Some(Duration::from_secs(120)));
/// assert_eq!(config.base_url, "http://chat.internal/api");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API base URL without trailing slash
    pub base_url: String,
    /// Timeout for ordinary requests (not applied to chat streams)
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Longest wait for the next chunk of a chat stream. `None` waits forever.
    pub stream_read_timeout: Option<Duration>,
    /// Model requested for chat
    pub model: String,
    /// Where cookies and client state are kept
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream_read_timeout: None,
            model: DEFAULT_MODEL.to_string(),
            data_dir: default_data_dir(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL. A trailing slash is dropped.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_stream_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_read_timeout = timeout;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Defaults overridden by `PARLEY_*` environment variables.
    ///
    /// Unparseable numbers are logged and ignored. A stream timeout of `0`
    /// disables the timeout.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_var("PARLEY_API_URL") {
            config = config.with_base_url(url);
        }
        if let Some(model) = env_var("PARLEY_MODEL") {
            config = config.with_model(model);
        }
        if let Some(secs) = env_secs("PARLEY_TIMEOUT_SECS") {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_secs("PARLEY_STREAM_TIMEOUT_SECS") {
            config = config.with_stream_read_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if let Some(dir) = env_var("PARLEY_DATA_DIR") {
            config = config.with_data_dir(dir);
        }

        config
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(name: &str) -> Option<u64> {
    let raw = env_var(name)?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            tracing::warn!(name, value = %raw, "Ignoring non-numeric timeout");
            None
        }
    }
}
