//! Stream event types.
//!
//! Every `data:` payload the backend sends is a JSON object of the shape
//! `{type?, content?, message?, conversation_id?}`. Payloads carrying a
//! `type` decode into [`StreamEvent`]; payloads without one are older
//! backends and decode into [`Payload::Legacy`].

use serde::Deserialize;

/// Optional fields shared by every event shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct EventFields {
    /// Text to display (for `content`) or descriptive text (for `thinking`)
    #[serde(default)]
    pub content: Option<String>,
    /// Human-readable status line
    #[serde(default)]
    pub message: Option<String>,
    /// Conversation this event belongs to; the server may assign a new one
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Typed events selected by the payload's `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of the assistant reply
    Content(EventFields),
    /// Generic progress notice
    Status(EventFields),
    /// Reasoning step shown while the reply is prepared
    Thinking(EventFields),
    /// Tool pipeline progress
    ToolsStatus(EventFields),
    /// Marks the start of the reply text
    ResponseStart(EventFields),
    /// Any tag this client does not know about
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Returns the event type name as a string for logging.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            StreamEvent::Content(_) => "content",
            StreamEvent::Status(_) => "status",
            StreamEvent::Thinking(_) => "thinking",
            StreamEvent::ToolsStatus(_) => "tools_status",
            StreamEvent::ResponseStart(_) => "response_start",
            StreamEvent::Unknown => "unknown",
        }
    }

    /// Fields of the event, `None` for [`StreamEvent::Unknown`].
    pub fn fields(&self) -> Option<&EventFields> {
        match self {
            StreamEvent::Content(f)
            | StreamEvent::Status(f)
            | StreamEvent::Thinking(f)
            | StreamEvent::ToolsStatus(f)
            | StreamEvent::ResponseStart(f) => Some(f),
            StreamEvent::Unknown => None,
        }
    }

    /// Whether this event only reports progress and must never extend
    /// the visible reply.
    pub fn is_status(&self) -> bool {
        matches!(
            self,
            StreamEvent::Status(_)
                | StreamEvent::Thinking(_)
                | StreamEvent::ToolsStatus(_)
                | StreamEvent::ResponseStart(_)
        )
    }
}

/// A decoded `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Payload with a non-null `type` key
    Tagged(StreamEvent),
    /// Payload without a `type` key
    Legacy(EventFields),
}

impl Payload {
    /// Decode a payload string.
    ///
    /// The presence of a non-empty `type` key alone decides between the
    /// tagged and legacy shapes, so a status payload that happens to carry
    /// `message` can never be read as legacy content. A `null` or `""` tag
    /// counts as absent.
    pub fn decode(data: &str) -> Result<Self, serde_json::Error> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(data)?;
        let tagged = match object.get("type") {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(tag)) => !tag.is_empty(),
            Some(_) => true,
        };
        let value = serde_json::Value::Object(object);

        if tagged {
            serde_json::from_value(value).map(Payload::Tagged)
        } else {
            serde_json::from_value(value).map(Payload::Legacy)
        }
    }

    /// Returns the payload type name as a string for logging.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            Payload::Tagged(event) => event.event_type_name(),
            Payload::Legacy(_) => "legacy",
        }
    }
}

/// Normalized delta handed to [`StreamHandler::on_message`](super::StreamHandler::on_message).
///
/// `content` is set only for events that extend the reply text. A delta with
/// just a `conversation_id` tells the caller which conversation the stream
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageDelta {
    pub content: Option<String>,
    pub conversation_id: Option<String>,
}

impl MessageDelta {
    /// A delta extending the reply text.
    pub fn content(content: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self {
            content: Some(content.into()),
            conversation_id,
        }
    }

    /// A delta that only correlates the stream with a conversation.
    pub fn conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            content: None,
            conversation_id: Some(conversation_id.into()),
        }
    }
}
