//! Client state store.
//!
//! [`StateStore`] owns the signed-in user, the conversation list and the
//! messages of the open conversation. Every mutation of a persisted field is
//! written through to a [`KeyValueStore`] before the method returns, and
//! observers are told about it over a broadcast channel.
//!
//! Lookups by message or conversation id never fail: an unknown id makes the
//! operation a no-op. Storage failures are logged and do not roll back the
//! in-memory change.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{ChatMessage, Conversation, Feedback, MessageStatus, UserInfo};
use crate::storage::KeyValueStore;

/// Storage key of the login flag.
pub const IS_LOGGED_IN_KEY: &str = "isLoggedIn";
/// Storage key of the signed-in user.
pub const USER_INFO_KEY: &str = "userInfo";
/// Storage key of the conversation list.
pub const CONVERSATIONS_KEY: &str = "conversations";
/// Storage key of the open conversation id.
pub const CURRENT_CONVERSATION_ID_KEY: &str = "currentConversationId";
/// Storage key of the open conversation's messages.
pub const CURRENT_MESSAGES_KEY: &str = "currentMessages";

const PERSISTED_KEYS: [&str; 5] = [
    IS_LOGGED_IN_KEY,
    USER_INFO_KEY,
    CONVERSATIONS_KEY,
    CURRENT_CONVERSATION_ID_KEY,
    CURRENT_MESSAGES_KEY,
];

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// The part of the state mirrored to storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub is_logged_in: bool,
    pub user_info: Option<UserInfo>,
    pub conversations: Vec<Conversation>,
    pub current_conversation_id: Option<String>,
    pub current_messages: Vec<ChatMessage>,
}

/// Presentation flags. Kept in memory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiFlags {
    pub is_loading: bool,
    pub show_profile: bool,
    pub show_settings: bool,
    pub show_login: bool,
    pub show_mobile_sidebar: bool,
    pub sidebar_collapsed: bool,
}

/// Notification sent to subscribers after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    LoggedIn(bool),
    UserInfo,
    Conversations,
    CurrentConversation(Option<String>),
    /// The message list was replaced or extended
    Messages,
    /// A single message changed in place
    Message { id: String },
    Ui,
    /// Everything was re-read from storage
    Reloaded,
}

/// Observable application state with write-through persistence.
pub struct StateStore {
    storage: Arc<dyn KeyValueStore>,
    state: PersistedState,
    ui: UiFlags,
    changes: broadcast::Sender<StateChange>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.state)
            .field("ui", &self.ui)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Build a store from whatever `storage` currently holds.
    ///
    /// Each field is read on its own; a missing or undecodable value falls
    /// back to its default without affecting the others.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let state = read_state(storage.as_ref());
        tracing::debug!(
            logged_in = state.is_logged_in,
            conversations = state.conversations.len(),
            messages = state.current_messages.len(),
            "Loaded client state"
        );
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            storage,
            state,
            ui: UiFlags::default(),
            changes,
        }
    }

    /// Re-read every persisted field and reset the UI flags.
    pub fn reload(&mut self) {
        self.state = read_state(self.storage.as_ref());
        self.ui = UiFlags::default();
        tracing::info!(logged_in = self.state.is_logged_in, "Reloaded client state");
        self.notify(StateChange::Reloaded);
    }

    /// Receive a [`StateChange`] for every subsequent mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn ui(&self) -> UiFlags {
        self.ui
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.is_logged_in
    }

    pub fn user_info(&self) -> Option<&UserInfo> {
        self.state.user_info.as_ref()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.state.conversations
    }

    pub fn current_conversation_id(&self) -> Option<&str> {
        self.state.current_conversation_id.as_deref()
    }

    pub fn current_messages(&self) -> &[ChatMessage] {
        &self.state.current_messages
    }

    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.state.current_messages.iter().find(|m| m.id == id)
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.state
            .conversations
            .iter()
            .find(|c| c.conversation_id == id)
    }

    // ---- session -------------------------------------------------------

    pub fn login_success(&mut self, user: UserInfo) {
        self.state.user_info = Some(user);
        self.persist(USER_INFO_KEY, &self.state.user_info);
        self.notify(StateChange::UserInfo);

        self.state.is_logged_in = true;
        self.persist(IS_LOGGED_IN_KEY, &self.state.is_logged_in);
        self.notify(StateChange::LoggedIn(true));
    }

    /// Clear every persisted field and remove their storage keys.
    pub fn logout(&mut self) {
        self.state = PersistedState::default();
        for key in PERSISTED_KEYS {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!(key, error = %e, "Failed to remove persisted state");
            }
        }
        tracing::info!("Cleared client state");
        self.notify(StateChange::LoggedIn(false));
        self.notify(StateChange::UserInfo);
        self.notify(StateChange::Conversations);
        self.notify(StateChange::CurrentConversation(None));
        self.notify(StateChange::Messages);
    }

    // ---- conversations -------------------------------------------------

    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.state.conversations = conversations;
        self.persist_conversations();
    }

    /// Replace the conversation with the same id, or put it first.
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        match self
            .state
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == conversation.conversation_id)
        {
            Some(existing) => *existing = conversation,
            None => self.state.conversations.insert(0, conversation),
        }
        self.persist_conversations();
    }

    /// Drop a conversation. Closing it too if it is the open one.
    pub fn remove_conversation(&mut self, id: &str) {
        let before = self.state.conversations.len();
        self.state.conversations.retain(|c| c.conversation_id != id);
        if self.state.conversations.len() != before {
            self.persist_conversations();
        }
        if self.current_conversation_id() == Some(id) {
            self.set_current_conversation_id(None);
            self.set_current_messages(Vec::new());
        }
    }

    pub fn rename_conversation(&mut self, id: &str, title: impl Into<String>) {
        let Some(conversation) = self
            .state
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == id)
        else {
            return;
        };
        conversation.title = title.into();
        self.persist_conversations();
    }

    /// Swap a conversation id for another one, in the list and as the open
    /// conversation. Used when the backend assigns the real id to a
    /// locally created conversation.
    pub fn replace_conversation_id(&mut self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        if let Some(conversation) = self
            .state
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == old_id)
        {
            conversation.conversation_id = new_id.to_string();
            self.persist_conversations();
        }
        if self.current_conversation_id() == Some(old_id) {
            self.set_current_conversation_id(Some(new_id.to_string()));
        }
    }

    pub fn set_current_conversation_id(&mut self, id: Option<String>) {
        let id = id.filter(|id| !id.is_empty());
        self.state.current_conversation_id = id.clone();
        self.persist(
            CURRENT_CONVERSATION_ID_KEY,
            &self.state.current_conversation_id,
        );
        self.notify(StateChange::CurrentConversation(id));
    }

    // ---- messages ------------------------------------------------------

    pub fn set_current_messages(&mut self, messages: Vec<ChatMessage>) {
        self.state.current_messages = messages;
        self.persist_messages();
        self.notify(StateChange::Messages);
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.state.current_messages.push(message);
        self.persist_messages();
        self.notify(StateChange::Messages);
    }

    /// Append `content` to a message, or replace its content when `replace`.
    pub fn update_message_content(&mut self, id: &str, content: &str, replace: bool) {
        self.update_open_message(id, |message| {
            if replace {
                message.content = content.to_string();
            } else {
                message.content.push_str(content);
            }
        });
    }

    pub fn update_message_status(&mut self, id: &str, status: MessageStatus) {
        self.update_open_message(id, |message| message.status = status);
    }

    pub fn update_message_thinking(&mut self, id: &str, thinking: Option<String>) {
        self.update_open_message(id, |message| message.thinking = thinking);
    }

    pub fn update_message_streaming(&mut self, id: &str, is_streaming: bool) {
        self.update_message(id, |message| message.is_streaming = is_streaming);
    }

    pub fn update_message_feedback(&mut self, id: &str, feedback: Option<Feedback>) {
        self.update_message(id, |message| message.feedback = feedback);
    }

    // ---- ui ------------------------------------------------------------

    pub fn set_loading(&mut self, loading: bool) {
        self.update_ui(|ui| ui.is_loading = loading);
    }

    pub fn set_show_profile(&mut self, show: bool) {
        self.update_ui(|ui| ui.show_profile = show);
    }

    pub fn set_show_settings(&mut self, show: bool) {
        self.update_ui(|ui| ui.show_settings = show);
    }

    pub fn set_show_login(&mut self, show: bool) {
        self.update_ui(|ui| ui.show_login = show);
    }

    pub fn set_show_mobile_sidebar(&mut self, show: bool) {
        self.update_ui(|ui| ui.show_mobile_sidebar = show);
    }

    pub fn set_sidebar_collapsed(&mut self, collapsed: bool) {
        self.update_ui(|ui| ui.sidebar_collapsed = collapsed);
    }

    // ---- internals -----------------------------------------------------

    /// Apply `f` to a message whose status is not terminal yet.
    /// Finished messages keep their content, thinking and status.
    fn update_open_message(&mut self, id: &str, f: impl FnOnce(&mut ChatMessage)) {
        if self
            .message(id)
            .is_some_and(|message| message.status.is_terminal())
        {
            tracing::debug!(message_id = id, "Ignoring update to finished message");
            return;
        }
        self.update_message(id, f);
    }

    fn update_message(&mut self, id: &str, f: impl FnOnce(&mut ChatMessage)) {
        let Some(message) = self
            .state
            .current_messages
            .iter_mut()
            .find(|m| m.id == id)
        else {
            tracing::trace!(message_id = id, "No such message");
            return;
        };
        f(message);
        self.persist_messages();
        self.notify(StateChange::Message { id: id.to_string() });
    }

    fn update_ui(&mut self, f: impl FnOnce(&mut UiFlags)) {
        let before = self.ui;
        f(&mut self.ui);
        if self.ui != before {
            self.notify(StateChange::Ui);
        }
    }

    fn persist_conversations(&self) {
        self.persist(CONVERSATIONS_KEY, &self.state.conversations);
        self.notify(StateChange::Conversations);
    }

    fn persist_messages(&self) {
        self.persist(CURRENT_MESSAGES_KEY, &self.state.current_messages);
    }

    fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(crate::error::StorageError::from)
            .and_then(|json| self.storage.set(key, &json));
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Failed to persist state");
        }
    }

    fn notify(&self, change: StateChange) {
        // No subscribers is fine
        let _ = self.changes.send(change);
    }
}

fn read_state(storage: &dyn KeyValueStore) -> PersistedState {
    PersistedState {
        is_logged_in: read_field(storage, IS_LOGGED_IN_KEY).unwrap_or_default(),
        user_info: read_field(storage, USER_INFO_KEY).flatten(),
        conversations: read_field(storage, CONVERSATIONS_KEY).unwrap_or_default(),
        current_conversation_id: read_field::<Option<String>>(
            storage,
            CURRENT_CONVERSATION_ID_KEY,
        )
        .flatten()
        .filter(|id| !id.is_empty()),
        current_messages: read_field(storage, CURRENT_MESSAGES_KEY).unwrap_or_default(),
    }
}

fn read_field<T: DeserializeOwned>(storage: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read persisted state");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring undecodable persisted state");
            None
        }
    }
}
