//! HTTP client for the chat backend.
//!
//! Every request carries `Authorization: Bearer <token>` when a `token`
//! cookie is present. A 401 from any endpoint removes the `token` and
//! `userInfo` cookies before [`ApiError::Unauthorized`] is returned.

mod stream;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::cookie::{CookieJar, TOKEN_COOKIE, USER_INFO_COOKIE};
use crate::error::ApiError;
use crate::models::{
    AuthResponse, ChangePasswordRequest, Conversation, Feedback, FeedbackRequest, LoginRequest,
    RegisterRequest, ServerMessage, TokenRefresh, UpdateTitleRequest, UserInfo,
};

/// Message used when an error response carries no readable reason.
const FALLBACK_ERROR_MESSAGE: &str = "Request failed";

/// Client for the chat backend API.
///
/// Cloning is cheap; clones share the connection pool and the
/// one-stream-at-a-time guard.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    client: Client,
    cookies: CookieJar,
    streaming: Arc<AtomicBool>,
}

impl ApiClient {
    /// Build a client. Only the connect timeout is set on the connection
    /// pool; the request timeout is applied per call so chat streams are not
    /// cut off.
    pub fn new(config: ClientConfig, cookies: CookieJar) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            cookies,
            streaming: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    // ---- auth ----------------------------------------------------------

    /// POST /auth/register
    pub async fn register(
        &self,
        username: Option<&str>,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        tracing::info!(email, "Registering account");
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            username: username.map(str::to_string),
        };
        self.send(self.request(Method::POST, "/auth/register").json(&body))
            .await
    }

    /// POST /auth/login
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        tracing::info!(email, "Logging in");
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.send(self.request(Method::POST, "/auth/login").json(&body))
            .await
    }

    /// POST /auth/change-password
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<Value, ApiError> {
        let body = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        self.send(self.request(Method::POST, "/auth/change-password").json(&body))
            .await
    }

    /// POST /auth/refresh?refresh_token=...
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefresh, ApiError> {
        tracing::debug!("Refreshing access token");
        let path = format!(
            "/auth/refresh?refresh_token={}",
            urlencoding::encode(refresh_token)
        );
        self.send(self.request(Method::POST, &path)).await
    }

    /// POST /auth/validate. Returns the user the token belongs to.
    pub async fn validate_token(&self) -> Result<UserInfo, ApiError> {
        self.send(self.request(Method::POST, "/auth/validate"))
            .await
    }

    /// POST /auth/logout
    pub async fn logout(&self) -> Result<Value, ApiError> {
        self.send(self.request(Method::POST, "/auth/logout")).await
    }

    /// GET /auth/me
    pub async fn current_user(&self) -> Result<UserInfo, ApiError> {
        self.send(self.request(Method::GET, "/auth/me")).await
    }

    // ---- conversations -------------------------------------------------

    /// A new conversation exists only locally until its first message is
    /// sent; the backend then assigns the real id.
    pub fn create_conversation(&self) -> Conversation {
        let conversation = Conversation::placeholder();
        tracing::debug!(
            conversation_id = %conversation.conversation_id,
            "Created local conversation"
        );
        conversation
    }

    /// GET /conversations/
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.send(self.request(Method::GET, "/conversations/"))
            .await
    }

    /// GET /conversations/{id}/messages
    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<ServerMessage>, ApiError> {
        let path = format!(
            "/conversations/{}/messages",
            urlencoding::encode(conversation_id)
        );
        self.send(self.request(Method::GET, &path)).await
    }

    /// DELETE /conversations/{id}
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<Value, ApiError> {
        let path = format!("/conversations/{}", urlencoding::encode(conversation_id));
        self.send(self.request(Method::DELETE, &path)).await
    }

    /// PATCH /conversations/{id}
    pub async fn update_conversation_title(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> Result<Value, ApiError> {
        let path = format!("/conversations/{}", urlencoding::encode(conversation_id));
        let body = UpdateTitleRequest {
            title: title.to_string(),
        };
        self.send(self.request(Method::PATCH, &path).json(&body))
            .await
    }

    /// PATCH /conversations/messages/{id}/feedback
    pub async fn update_message_feedback(
        &self,
        message_id: &str,
        feedback: Feedback,
    ) -> Result<Value, ApiError> {
        let path = format!(
            "/conversations/messages/{}/feedback",
            urlencoding::encode(message_id)
        );
        self.send(self.request(Method::PATCH, &path).json(&FeedbackRequest { feedback }))
            .await
    }

    // ---- user profile --------------------------------------------------

    /// GET /user/emotion-profile
    pub async fn emotion_profile(&self) -> Result<Value, ApiError> {
        self.send(self.request(Method::GET, "/user/emotion-profile"))
            .await
    }

    /// GET /user/emotion-stats
    pub async fn emotion_stats(&self) -> Result<Value, ApiError> {
        self.send(self.request(Method::GET, "/user/emotion-stats"))
            .await
    }

    // ---- plumbing ------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Request with auth header and the non-streaming timeout.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!(%method, %url, "Sending request");
        self.authorize(self.client.request(method, url))
            .timeout(self.config.request_timeout)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.cookies.get(TOKEN_COOKIE) {
            Some(token) => builder.bearer_auth(token),
            None => {
                tracing::debug!("No token cookie, sending request unauthenticated");
                builder
            }
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.check_status(builder.send().await?).await?;
        let text = response.text().await?;
        // Empty success bodies decode as JSON null
        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        Ok(serde_json::from_str(body)?)
    }

    /// Pass success responses through; turn everything else into an error.
    async fn check_status(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        tracing::warn!(status = status.as_u16(), %url, %message, "Request failed");

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_credentials();
            return Err(ApiError::Unauthorized { message });
        }
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }

    fn invalidate_credentials(&self) {
        tracing::info!("Token rejected, clearing stored credentials");
        for name in [TOKEN_COOKIE, USER_INFO_COOKIE] {
            if let Err(e) = self.cookies.remove(name) {
                tracing::warn!(cookie = name, error = %e, "Failed to remove cookie");
            }
        }
    }
}

/// Pick the human-readable reason out of an error body: `detail`, then
/// `message`, else a generic message.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return FALLBACK_ERROR_MESSAGE.to_string();
    };
    ["detail", "message"]
        .iter()
        .filter_map(|key| value.get(*key))
        .find_map(|field| match field {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
}
