//! Chat session: the API client and the state store working together.
//!
//! [`ChatSession`] owns both halves and keeps them consistent. Credentials
//! go to the cookie jar, conversation and message changes go to the store,
//! and a streamed reply is written into the store fragment by fragment as it
//! arrives.

use std::sync::Arc;

use chrono::Utc;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::cookie::{CookieJar, REFRESH_TOKEN_COOKIE, TOKEN_COOKIE, USER_INFO_COOKIE};
use crate::error::{ApiError, StreamError};
use crate::models::{
    is_placeholder_id, AuthResponse, ChatMessage, Feedback, MessageStatus, UserInfo,
};
use crate::sse::{MessageDelta, StreamHandler, StreamSummary};
use crate::state::StateStore;
use crate::storage::{FileStore, KeyValueStore};

/// Content given to a reply cancelled before any text arrived.
const CANCELLED_TEXT: &str = "Reply cancelled.";

/// Result of [`ChatSession::send_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    /// Local id of the assistant reply in the store
    pub message_id: String,
    /// Conversation the reply belongs to, once known
    pub conversation_id: Option<String>,
    pub summary: StreamSummary,
    /// Set when the stream failed after it started
    pub error: Option<StreamError>,
}

/// API client plus state store for one signed-in user.
#[derive(Debug)]
pub struct ChatSession {
    api: ApiClient,
    store: StateStore,
}

impl ChatSession {
    pub fn new(api: ApiClient, store: StateStore) -> Self {
        Self { api, store }
    }

    /// Open a session backed by files in `config.data_dir`.
    pub fn open(config: ClientConfig) -> Result<Self, ApiError> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
        let store = StateStore::load(Arc::clone(&storage));
        let api = ApiClient::new(config, CookieJar::new(storage))?;
        Ok(Self::new(api, store))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    /// Logged in according to the store and holding a live token.
    pub fn is_authenticated(&self) -> bool {
        self.store.is_logged_in() && self.api.cookies().has(TOKEN_COOKIE)
    }

    // ---- account -------------------------------------------------------

    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserInfo, ApiError> {
        let response = self.api.login(email, password).await;
        let response = self.checked(response)?;
        self.accept_auth(response)
    }

    pub async fn register(
        &mut self,
        username: Option<&str>,
        email: &str,
        password: &str,
    ) -> Result<UserInfo, ApiError> {
        let response = self.api.register(username, email, password).await;
        let response = self.checked(response)?;
        self.accept_auth(response)
    }

    /// Sign out locally. The server is told first when a token is held;
    /// a failure there does not keep the local session alive.
    pub async fn logout(&mut self) {
        if self.api.cookies().has(TOKEN_COOKIE) {
            if let Err(e) = self.api.logout().await {
                tracing::warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }
        for name in [TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USER_INFO_COOKIE] {
            if let Err(e) = self.api.cookies().remove(name) {
                tracing::warn!(cookie = name, error = %e, "Failed to remove cookie");
            }
        }
        self.store.logout();
    }

    /// Fetch the signed-in user and refresh the stored copy.
    pub async fn current_user(&mut self) -> Result<UserInfo, ApiError> {
        let response = self.api.current_user().await;
        let user = self.checked(response)?;
        self.store.login_success(user.clone());
        Ok(user)
    }

    fn accept_auth(&mut self, response: AuthResponse) -> Result<UserInfo, ApiError> {
        let cookies = self.api.cookies();
        cookies.set_default(TOKEN_COOKIE, &response.access_token)?;
        if let Some(refresh) = response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            cookies.set_default(REFRESH_TOKEN_COOKIE, refresh)?;
        }
        let user = response.user_info();
        cookies.set_default(USER_INFO_COOKIE, &serde_json::to_string(&user)?)?;

        tracing::info!(user_id = %user.user_id, "Signed in");
        self.store.login_success(user.clone());
        Ok(user)
    }

    // ---- conversations -------------------------------------------------

    /// Replace the conversation list with the server's, keeping local
    /// conversations that have not been sent yet.
    pub async fn refresh_conversations(&mut self) -> Result<(), ApiError> {
        let response = self.api.conversations().await;
        let remote = self.checked(response)?;

        let mut conversations: Vec<_> = self
            .store
            .conversations()
            .iter()
            .filter(|c| c.is_placeholder())
            .cloned()
            .collect();
        conversations.extend(remote);
        self.store.set_conversations(conversations);
        Ok(())
    }

    /// Start a local conversation and make it the open one.
    pub fn new_conversation(&mut self) -> String {
        let conversation = self.api.create_conversation();
        let id = conversation.conversation_id.clone();
        self.store.upsert_conversation(conversation);
        self.store.set_current_conversation_id(Some(id.clone()));
        self.store.set_current_messages(Vec::new());
        id
    }

    /// Make `conversation_id` the open conversation and load its history.
    pub async fn open_conversation(&mut self, conversation_id: &str) -> Result<(), ApiError> {
        if is_placeholder_id(conversation_id) {
            self.store
                .set_current_conversation_id(Some(conversation_id.to_string()));
            self.store.set_current_messages(Vec::new());
            return Ok(());
        }

        self.store.set_loading(true);
        let response = self.api.messages(conversation_id).await;
        self.store.set_loading(false);
        let history = self.checked(response)?;

        self.store
            .set_current_conversation_id(Some(conversation_id.to_string()));
        self.store.set_current_messages(
            history
                .into_iter()
                .map(|m| m.into_chat_message())
                .collect(),
        );
        Ok(())
    }

    pub async fn rename_conversation(
        &mut self,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), ApiError> {
        if !is_placeholder_id(conversation_id) {
            let response = self.api.update_conversation_title(conversation_id, title).await;
            self.checked(response)?;
        }
        self.store.rename_conversation(conversation_id, title);
        Ok(())
    }

    pub async fn delete_conversation(&mut self, conversation_id: &str) -> Result<(), ApiError> {
        if !is_placeholder_id(conversation_id) {
            let response = self.api.delete_conversation(conversation_id).await;
            self.checked(response)?;
        }
        self.store.remove_conversation(conversation_id);
        Ok(())
    }

    // ---- messages ------------------------------------------------------

    /// Send `text` in the open conversation (starting one if needed) and
    /// stream the reply into the store. `on_content` sees every content
    /// fragment as it is appended.
    ///
    /// Failures before the reply starts are written into the assistant
    /// message as its error text and also returned as `Err`.
    pub async fn send_message<F>(&mut self, text: &str, on_content: F) -> Result<SendReport, ApiError>
    where
        F: FnMut(&str),
    {
        if self.store.current_conversation_id().is_none() {
            self.new_conversation();
        }
        let conversation_id = self.store.current_conversation_id().map(str::to_string);

        self.store.add_message(ChatMessage::user(text));
        let reply = ChatMessage::assistant_placeholder();
        let message_id = reply.id.clone();
        self.store.add_message(reply);
        self.store.set_loading(true);

        let mut handler = StoreHandler {
            store: &mut self.store,
            message_id: message_id.clone(),
            conversation_id: conversation_id.clone(),
            on_content,
            error: None,
        };
        let result = self
            .api
            .stream_chat(text, conversation_id.as_deref(), &mut handler)
            .await;
        let StoreHandler {
            conversation_id,
            error,
            ..
        } = handler;

        self.store.set_loading(false);

        match result {
            Ok(summary) => {
                if let Some(id) = conversation_id.as_deref() {
                    self.touch_conversation(id);
                }
                Ok(SendReport {
                    message_id,
                    conversation_id,
                    summary,
                    error,
                })
            }
            Err(e) => {
                self.store
                    .update_message_content(&message_id, &e.user_message(), true);
                self.store
                    .update_message_status(&message_id, MessageStatus::Error);
                self.store.update_message_streaming(&message_id, false);
                self.note_failure(&e);
                Err(e)
            }
        }
    }

    /// Close out a reply whose stream was abandoned, e.g. when the
    /// `send_message` future was dropped. Partial content is kept.
    pub fn cancel_reply(&mut self, message_id: &str) {
        let Some(message) = self.store.message(message_id) else {
            return;
        };
        if message.status.is_terminal() {
            return;
        }
        if message.content.is_empty() {
            self.store
                .update_message_content(message_id, CANCELLED_TEXT, true);
        }
        self.store
            .update_message_status(message_id, MessageStatus::Error);
        self.store.update_message_streaming(message_id, false);
        self.store.set_loading(false);
        tracing::info!(message_id, "Reply cancelled");
    }

    /// Id of the newest assistant reply that is still streaming.
    pub fn pending_reply(&self) -> Option<&str> {
        self.store
            .current_messages()
            .iter()
            .rev()
            .find(|m| m.is_streaming && !m.status.is_terminal())
            .map(|m| m.id.as_str())
    }

    /// Rate a message loaded from history. `Neutral` clears the rating.
    pub async fn rate_message(&mut self, message_id: &str, feedback: Feedback) -> Result<(), ApiError> {
        let response = self.api.update_message_feedback(message_id, feedback).await;
        self.checked(response)?;
        let stored = (feedback != Feedback::Neutral).then_some(feedback);
        self.store.update_message_feedback(message_id, stored);
        Ok(())
    }

    fn touch_conversation(&mut self, conversation_id: &str) {
        if let Some(mut conversation) = self.store.conversation(conversation_id).cloned() {
            conversation.updated_at = Utc::now();
            conversation.message_count = conversation.message_count.map(|n| n + 2);
            self.store.upsert_conversation(conversation);
        }
    }

    fn checked<T>(&mut self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            self.note_failure(e);
        }
        result
    }

    /// Reload state from storage when the server rejected our credentials.
    fn note_failure(&mut self, error: &ApiError) {
        if error.requires_reauth() {
            tracing::warn!("Session expired, reloading client state");
            self.store.reload();
        }
    }
}

/// Writes one streamed reply into the store.
struct StoreHandler<'a, F> {
    store: &'a mut StateStore,
    message_id: String,
    conversation_id: Option<String>,
    on_content: F,
    error: Option<StreamError>,
}

impl<F> StoreHandler<'_, F> {
    /// Follow the conversation id the server reports. A local placeholder
    /// is swapped for the real id everywhere it is referenced.
    fn adopt_conversation(&mut self, id: String) {
        match self.conversation_id.as_deref() {
            Some(current) if current == id => {}
            Some(current) if is_placeholder_id(current) => {
                tracing::debug!(from = current, to = %id, "Conversation assigned by server");
                self.store.replace_conversation_id(current, &id);
                self.conversation_id = Some(id);
            }
            Some(current) => {
                tracing::warn!(expected = current, got = %id, "Stream reported a different conversation");
            }
            None => {
                self.store.set_current_conversation_id(Some(id.clone()));
                self.conversation_id = Some(id);
            }
        }
    }

    fn finish(&mut self, status: MessageStatus) {
        self.store.update_message_status(&self.message_id, status);
        self.store.update_message_streaming(&self.message_id, false);
    }
}

impl<F: FnMut(&str)> StreamHandler for StoreHandler<'_, F> {
    fn on_message(&mut self, delta: MessageDelta) {
        if let Some(id) = delta.conversation_id {
            self.adopt_conversation(id);
        }
        if let Some(content) = delta.content {
            if self
                .store
                .message(&self.message_id)
                .is_some_and(|m| m.status == MessageStatus::Pending)
            {
                self.store
                    .update_message_status(&self.message_id, MessageStatus::Streaming);
            }
            self.store
                .update_message_content(&self.message_id, &content, false);
            (self.on_content)(&content);
        }
    }

    fn on_complete(&mut self) {
        self.finish(MessageStatus::Done);
    }

    fn on_error(&mut self, error: StreamError) {
        let empty = self
            .store
            .message(&self.message_id)
            .map_or(true, |m| m.content.is_empty());
        if empty {
            self.store
                .update_message_content(&self.message_id, &error.user_message(), true);
        }
        self.finish(MessageStatus::Error);
        self.error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn session() -> ChatSession {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let api = ApiClient::new(
            ClientConfig::default().with_base_url("http://127.0.0.1:1"),
            CookieJar::new(Arc::clone(&storage)),
        )
        .unwrap();
        ChatSession::new(api, StateStore::load(storage))
    }

    fn handler<'a>(
        store: &'a mut StateStore,
        message_id: &str,
        conversation_id: Option<&str>,
    ) -> StoreHandler<'a, impl FnMut(&str)> {
        StoreHandler {
            store,
            message_id: message_id.to_string(),
            conversation_id: conversation_id.map(str::to_string),
            on_content: |_: &str| {},
            error: None,
        }
    }

    #[test]
    fn test_new_conversation_becomes_current() {
        let mut session = session();
        let id = session.new_conversation();
        assert!(is_placeholder_id(&id));
        assert_eq!(session.store().current_conversation_id(), Some(id.as_str()));
        assert_eq!(session.store().conversations().len(), 1);
    }

    #[test]
    fn test_handler_streams_into_store() {
        let mut session = session();
        let temp_id = session.new_conversation();
        let reply = ChatMessage::assistant_placeholder();
        let id = reply.id.clone();
        session.store_mut().add_message(reply);

        let mut h = handler(session.store_mut(), &id, Some(&temp_id));
        h.on_message(MessageDelta::conversation("real-1".to_string()));
        h.on_message(MessageDelta::content("Hel".to_string(), None));
        assert_eq!(h.store.message(&id).unwrap().status, MessageStatus::Streaming);
        h.on_message(MessageDelta::content("lo".to_string(), Some("real-1".to_string())));
        h.on_complete();
        assert_eq!(h.conversation_id.as_deref(), Some("real-1"));

        let store = session.store();
        let msg = store.message(&id).unwrap();
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.status, MessageStatus::Done);
        assert!(!msg.is_streaming);
        assert_eq!(store.current_conversation_id(), Some("real-1"));
        assert_eq!(store.conversations()[0].conversation_id, "real-1");
    }

    #[test]
    fn test_handler_error_without_content() {
        let mut session = session();
        let reply = ChatMessage::assistant_placeholder();
        let id = reply.id.clone();
        session.store_mut().add_message(reply);

        let mut h = handler(session.store_mut(), &id, None);
        h.on_error(StreamError::transport("connection reset"));
        assert!(h.error.is_some());

        let msg = session.store().message(&id).unwrap();
        assert_eq!(msg.status, MessageStatus::Error);
        assert!(!msg.content.is_empty());
        assert!(!msg.is_streaming);
    }

    #[test]
    fn test_handler_error_keeps_partial_content() {
        let mut session = session();
        let reply = ChatMessage::assistant_placeholder();
        let id = reply.id.clone();
        session.store_mut().add_message(reply);

        let mut h = handler(session.store_mut(), &id, Some("c1"));
        h.on_message(MessageDelta::content("partial".to_string(), None));
        h.on_error(StreamError::Timeout { duration_secs: 30 });

        assert_eq!(session.store().message(&id).unwrap().content, "partial");
    }

    #[test]
    fn test_handler_ignores_foreign_conversation() {
        let mut session = session();
        let reply = ChatMessage::assistant_placeholder();
        let id = reply.id.clone();
        session.store_mut().add_message(reply);
        session
            .store_mut()
            .set_current_conversation_id(Some("c1".to_string()));

        let mut h = handler(session.store_mut(), &id, Some("c1"));
        h.on_message(MessageDelta::conversation("c2".to_string()));
        assert_eq!(h.conversation_id.as_deref(), Some("c1"));
        assert_eq!(session.store().current_conversation_id(), Some("c1"));
    }

    #[tokio::test]
    async fn test_send_failure_marks_reply_as_error() {
        let mut session = session();
        let err = session.send_message("hello", |_| {}).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));

        let messages = session.store().current_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].status, MessageStatus::Error);
        assert_eq!(messages[1].content, err.user_message());
        assert!(!session.store().ui().is_loading);
        assert!(!session.api().is_streaming());
    }

    #[test]
    fn test_cancel_reply() {
        let mut session = session();
        let reply = ChatMessage::assistant_placeholder();
        let id = reply.id.clone();
        session.store_mut().add_message(ChatMessage::user("hi"));
        session.store_mut().add_message(reply);
        session.store_mut().set_loading(true);

        assert_eq!(session.pending_reply(), Some(id.as_str()));
        session.cancel_reply(&id);

        let msg = session.store().message(&id).unwrap();
        assert_eq!(msg.status, MessageStatus::Error);
        assert_eq!(msg.content, CANCELLED_TEXT);
        assert!(!session.store().ui().is_loading);
        assert_eq!(session.pending_reply(), None);
    }

    #[tokio::test]
    async fn test_placeholder_rename_and_delete_stay_local() {
        let mut session = session();
        let id = session.new_conversation();
        session.rename_conversation(&id, "Draft").await.unwrap();
        assert_eq!(session.store().conversation(&id).unwrap().title, "Draft");

        session.delete_conversation(&id).await.unwrap();
        assert!(session.store().conversations().is_empty());
        assert_eq!(session.store().current_conversation_id(), None);
    }
}
