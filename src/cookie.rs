//! Cookie utilities.
//!
//! The client keeps its bearer token and a few small values as cookies with
//! an expiry date. Cookies live in a [`KeyValueStore`] under `cookie.<name>`
//! so they survive restarts the same way the rest of the client state does.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::KeyValueStore;

/// Cookie holding the bearer token.
pub const TOKEN_COOKIE: &str = "token";

/// Cookie holding the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Cookie holding the serialized user info.
pub const USER_INFO_COOKIE: &str = "userInfo";

/// Default lifetime of a cookie in days.
pub const DEFAULT_COOKIE_DAYS: i64 = 7;

const KEY_PREFIX: &str = "cookie.";

/// A stored cookie value with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Cookie {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Named, expiring values persisted in a [`KeyValueStore`].
#[derive(Clone)]
pub struct CookieJar {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieJar").finish_non_exhaustive()
    }
}

impl CookieJar {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Store `value` under `name` for `days` days.
    ///
    /// Fails with [`StorageError::InvalidExpiry`] when `days` puts the expiry
    /// outside the representable date range.
    pub fn set(&self, name: &str, value: &str, days: i64) -> Result<(), StorageError> {
        let expires_at = TimeDelta::try_days(days)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or(StorageError::InvalidExpiry { days })?;
        let cookie = Cookie {
            value: value.to_string(),
            expires_at,
        };
        let shown = if is_credential(name) { "[HIDDEN]" } else { value };
        tracing::debug!(name, value = shown, days, "Setting cookie");
        self.store.set(&key(name), &serde_json::to_string(&cookie)?)
    }

    /// Store `value` under `name` for [`DEFAULT_COOKIE_DAYS`].
    pub fn set_default(&self, name: &str, value: &str) -> Result<(), StorageError> {
        self.set(name, value, DEFAULT_COOKIE_DAYS)
    }

    /// Read a cookie value. Expired or unreadable cookies are removed and
    /// reported as absent.
    pub fn get(&self, name: &str) -> Option<String> {
        let raw = match self.store.get(&key(name)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(name, error = %e, "Failed to read cookie");
                return None;
            }
        };

        match serde_json::from_str::<Cookie>(&raw) {
            Ok(cookie) if !cookie.is_expired() => Some(cookie.value),
            Ok(_) => {
                tracing::debug!(name, "Cookie expired");
                self.discard(name);
                None
            }
            Err(e) => {
                tracing::warn!(name, error = %e, "Discarding unreadable cookie");
                self.discard(name);
                None
            }
        }
    }

    /// Delete a cookie.
    pub fn remove(&self, name: &str) -> Result<(), StorageError> {
        tracing::debug!(name, "Removing cookie");
        self.store.remove(&key(name))
    }

    /// Whether a live cookie named `name` exists.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Render the given cookies as a `Cookie` header value
    /// (`a=1; b=2`), percent-encoding the values. Absent cookies are skipped.
    pub fn cookie_header(&self, names: &[&str]) -> Option<String> {
        let pairs: Vec<String> = names
            .iter()
            .filter_map(|name| {
                self.get(name)
                    .map(|value| format!("{}={}", name, urlencoding::encode(&value)))
            })
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    fn discard(&self, name: &str) {
        if let Err(e) = self.store.remove(&key(name)) {
            tracing::warn!(name, error = %e, "Failed to remove cookie");
        }
    }
}

fn is_credential(name: &str) -> bool {
    name == TOKEN_COOKIE || name == REFRESH_TOKEN_COOKIE
}

fn key(name: &str) -> String {
    format!("{}{}", KEY_PREFIX, name)
}

/// Look up `name` in a `Cookie` header value, percent-decoding the result.
///
/// Leading spaces before each pair are skipped; the first matching pair wins.
pub fn parse_cookie_header(header: &str, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    header
        .split(';')
        .map(|pair| pair.trim_start_matches(' '))
        .find_map(|pair| pair.strip_prefix(prefix.as_str()))
        .map(|raw| {
            urlencoding::decode(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        })
}
