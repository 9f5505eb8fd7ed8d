use serde::Serialize;

use super::Feedback;

/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    /// `None` starts a new conversation on the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub model: String,
    pub stream: bool,
}

impl ChatRequest {
    /// A streaming request on the default model.
    pub fn new(message: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id,
            model: DEFAULT_MODEL.to_string(),
            stream: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateTitleRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest {
    pub feedback: Feedback,
}
