use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::deserialize_timestamp;

/// Prefix of ids assigned locally before the backend has seen the conversation.
const PLACEHOLDER_PREFIX: &str = "temp_";

/// Title given to locally created conversations.
pub const NEW_CONVERSATION_TITLE: &str = "New conversation";

/// A conversation as listed by `GET /conversations/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(deserialize_with = "deserialize_timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u32>,
}

impl Conversation {
    /// A local conversation with a temporary id. The backend assigns the
    /// real id when the first message is sent.
    pub fn placeholder() -> Self {
        let now = Utc::now();
        Self {
            conversation_id: format!("{}{}", PLACEHOLDER_PREFIX, now.timestamp_millis()),
            title: NEW_CONVERSATION_TITLE.to_string(),
            created_at: now,
            updated_at: now,
            message_count: None,
        }
    }

    /// Whether the id was assigned locally.
    pub fn is_placeholder(&self) -> bool {
        is_placeholder_id(&self.conversation_id)
    }
}

/// Whether `id` is a locally assigned placeholder id.
pub fn is_placeholder_id(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}
