//! Data models shared by the API client, the state store and the CLI.

mod conversation;
mod message;
mod request;
mod user;

pub use conversation::{is_placeholder_id, Conversation, NEW_CONVERSATION_TITLE};
pub use message::{ChatMessage, Feedback, MessageRole, MessageStatus, ServerMessage};
pub use request::{
    ChangePasswordRequest, ChatRequest, FeedbackRequest, LoginRequest, RegisterRequest,
    UpdateTitleRequest, DEFAULT_MODEL,
};
pub use user::{AuthResponse, TokenRefresh, UserInfo};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and the offset-less ISO form (`2025-03-01T10:00:00.123456`)
/// the backend emits; the latter is taken as UTC.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Deserialize a timestamp with [`parse_timestamp`], falling back to now for
/// missing or unparseable values.
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp("2025-03-01T10:00:00+08:00").unwrap();
        assert_eq!(dt.hour(), 2);
    }

    #[test]
    fn test_parse_naive_iso() {
        let dt = parse_timestamp("2025-03-01T10:00:00.123456").unwrap();
        assert_eq!(dt.day(), 1);
        assert_eq!(dt.hour(), 10);

        let dt = parse_timestamp("2025-03-01T10:00:00").unwrap();
        assert_eq!(dt.minute(), 0);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
    }
}
