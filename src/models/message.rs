use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parse_timestamp;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Lifecycle of a message. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Sent, waiting for the first content fragment
    #[default]
    Pending,
    /// Content is arriving
    Streaming,
    Done,
    Error,
}

impl MessageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Done | MessageStatus::Error)
    }
}

/// User rating of an assistant reply, sent to the backend as -1, 0 or 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "i8", try_from = "i8")]
pub enum Feedback {
    Negative,
    Neutral,
    Positive,
}

impl From<Feedback> for i8 {
    fn from(feedback: Feedback) -> Self {
        match feedback {
            Feedback::Negative => -1,
            Feedback::Neutral => 0,
            Feedback::Positive => 1,
        }
    }
}

impl TryFrom<i8> for Feedback {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Feedback::Negative),
            0 => Ok(Feedback::Neutral),
            1 => Ok(Feedback::Positive),
            other => Err(format!("feedback must be -1, 0 or 1, got {}", other)),
        }
    }
}

impl std::str::FromStr for Feedback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "good" | "like" | "+1" | "1" => Ok(Feedback::Positive),
            "down" | "bad" | "dislike" | "-1" => Ok(Feedback::Negative),
            "none" | "clear" | "0" => Ok(Feedback::Neutral),
            other => Err(format!("unknown feedback '{}', expected up, down or none", other)),
        }
    }
}

/// A message held by the client state store.
///
/// Serialized with camelCase keys (`isStreaming`) since it is persisted in
/// the same shape the web client used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: MessageStatus,
    /// Side-channel reasoning text, never part of `content`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// A message typed by the user; complete as soon as it exists.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::User,
            content: content.into(),
            status: MessageStatus::Done,
            thinking: None,
            is_streaming: false,
            feedback: None,
            timestamp: Utc::now(),
        }
    }

    /// An empty assistant reply waiting for the stream.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content: String::new(),
            status: MessageStatus::Pending,
            thinking: None,
            is_streaming: true,
            feedback: None,
            timestamp: Utc::now(),
        }
    }
}

/// Message as returned by `GET /conversations/{id}/messages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    /// Database row id
    #[serde(default)]
    pub id: Option<i64>,
    /// Public message id, used for feedback
    pub message_id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub token_count: Option<i64>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub feedback: Option<i8>,
}

impl ServerMessage {
    /// Convert to a client message. History is always complete.
    pub fn into_chat_message(self) -> ChatMessage {
        let timestamp = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        ChatMessage {
            id: self.message_id,
            role: self.role,
            content: self.content,
            status: MessageStatus::Done,
            thinking: None,
            is_streaming: false,
            feedback: self.feedback.and_then(|f| Feedback::try_from(f).ok()),
            timestamp,
        }
    }
}
