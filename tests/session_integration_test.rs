//! End-to-end tests for `ChatSession` against a mock backend.
//!
//! State is written to a `FileStore` in a temp directory so each test can
//! reopen it and check what survived.

mod common;

use std::sync::Arc;

use common::{signed_in_session, sse_body, sse_response, test_user};
use parley::cookie::{CookieJar, TOKEN_COOKIE};
use parley::error::ApiError;
use parley::models::{is_placeholder_id, Feedback, MessageRole, MessageStatus};
use parley::session::ChatSession;
use parley::state::StateStore;
use parley::storage::{FileStore, KeyValueStore};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file_storage(dir: &TempDir) -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::open(dir.path()).unwrap())
}

async fn mount_reply(server: &MockServer, conversation_id: &str, fragments: &[&str]) {
    let mut events = vec![json!({"type": "status", "message": "Processing your message..."})];
    events.extend(fragments.iter().map(|f| {
        json!({"type": "content", "content": f, "conversation_id": conversation_id})
    }));
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(sse_body(&events)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_send_message_streams_into_store_and_persists() {
    let mock_server = MockServer::start().await;
    mount_reply(&mock_server, "conv-9", &["Hel", "lo", "!"]).await;

    let temp_dir = TempDir::new().unwrap();
    let mut session = signed_in_session(&mock_server.uri(), file_storage(&temp_dir));
    let placeholder = session.new_conversation();
    assert!(is_placeholder_id(&placeholder));

    let mut fragments = Vec::new();
    let report = session
        .send_message("hi there", |c| fragments.push(c.to_string()))
        .await
        .unwrap();

    assert_eq!(fragments, vec!["Hel", "lo", "!"]);
    assert_eq!(report.conversation_id.as_deref(), Some("conv-9"));
    assert!(report.error.is_none());

    let store = session.store();
    assert_eq!(store.current_conversation_id(), Some("conv-9"));
    assert!(store.conversation(&placeholder).is_none());
    assert!(store.conversation("conv-9").is_some());
    assert!(!store.ui().is_loading);

    let messages = store.current_messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "hi there");
    assert_eq!(messages[1].id, report.message_id);
    assert_eq!(messages[1].content, "Hello!");
    assert_eq!(messages[1].status, MessageStatus::Done);
    assert!(!messages[1].is_streaming);

    // A fresh store over the same directory sees the same state
    let reopened = StateStore::load(file_storage(&temp_dir));
    assert!(reopened.is_logged_in());
    assert_eq!(reopened.current_conversation_id(), Some("conv-9"));
    assert_eq!(reopened.current_messages(), session.store().current_messages());
    assert_eq!(reopened.conversations()[0].conversation_id, "conv-9");
}

#[tokio::test]
async fn test_send_without_open_conversation_starts_one() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({"message": "first", "model": "deepseek-chat", "stream": true})))
        .respond_with(sse_response(sse_body(&[
            json!({"type": "content", "content": "ok", "conversation_id": "conv-1"}),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut session = signed_in_session(&mock_server.uri(), file_storage(&temp_dir));
    assert!(session.store().current_conversation_id().is_none());

    session.send_message("first", |_| {}).await.unwrap();

    assert_eq!(session.store().current_conversation_id(), Some("conv-1"));
    assert_eq!(session.store().conversations().len(), 1);
}

#[tokio::test]
async fn test_unauthorized_send_signs_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut session = signed_in_session(&mock_server.uri(), file_storage(&temp_dir));
    assert!(session.is_authenticated());
    session.new_conversation();

    let err = session.send_message("hello", |_| {}).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { .. }));
    assert!(!session.is_authenticated());
    assert!(!session.api().cookies().has(TOKEN_COOKIE));

    let reply = session.store().current_messages().last().unwrap().clone();
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.status, MessageStatus::Error);
    assert_eq!(reply.content, "Token expired. Please log in again.");
    assert!(!session.store().ui().is_loading);
}

#[tokio::test]
async fn test_open_conversation_and_rate_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/conversations/conv-1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"message_id": "m-1", "role": "user", "content": "hi"},
            {"message_id": "m-2", "role": "assistant", "content": "hello", "feedback": null}
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/conversations/messages/m-2/feedback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut session = signed_in_session(&mock_server.uri(), file_storage(&temp_dir));

    session.open_conversation("conv-1").await.unwrap();
    assert_eq!(session.store().current_conversation_id(), Some("conv-1"));
    assert_eq!(session.store().current_messages().len(), 2);

    session.rate_message("m-2", Feedback::Positive).await.unwrap();
    assert_eq!(
        session.store().message("m-2").unwrap().feedback,
        Some(Feedback::Positive)
    );

    session.rate_message("m-2", Feedback::Neutral).await.unwrap();
    assert_eq!(session.store().message("m-2").unwrap().feedback, None);
}

#[tokio::test]
async fn test_refresh_keeps_unsent_conversations_first() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/conversations/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"conversation_id": "conv-a", "title": "A"},
            {"conversation_id": "conv-b", "title": "B"}
        ])))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut session = signed_in_session(&mock_server.uri(), file_storage(&temp_dir));
    let local = session.new_conversation();

    session.refresh_conversations().await.unwrap();

    let ids: Vec<_> = session
        .store()
        .conversations()
        .iter()
        .map(|c| c.conversation_id.as_str())
        .collect();
    assert_eq!(ids, vec![local.as_str(), "conv-a", "conv-b"]);
}

#[tokio::test]
async fn test_logout_clears_local_state_even_if_server_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut session = signed_in_session(&mock_server.uri(), file_storage(&temp_dir));
    session.new_conversation();

    session.logout().await;

    assert!(!session.is_authenticated());
    assert!(session.store().user_info().is_none());
    assert!(session.store().conversations().is_empty());

    let reopened = StateStore::load(file_storage(&temp_dir));
    assert!(!reopened.is_logged_in());
    assert!(reopened.current_conversation_id().is_none());
}

#[tokio::test]
async fn test_login_stores_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "refresh_token": "fresh-refresh",
            "user_id": "user-123",
            "email": "ann@example.com",
            "username": "ann"
        })))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let storage = file_storage(&temp_dir);
    let config = parley::config::ClientConfig::default()
        .with_base_url(mock_server.uri())
        .with_data_dir(temp_dir.path());
    let api = parley::api::ApiClient::new(config, CookieJar::new(Arc::clone(&storage))).unwrap();
    let mut session = ChatSession::new(api, StateStore::load(storage));
    assert!(!session.is_authenticated());

    let user = session.login("ann@example.com", "secret").await.unwrap();
    assert_eq!(user.user_id, test_user().user_id);
    assert!(session.is_authenticated());
    assert_eq!(
        session.api().cookies().get(TOKEN_COOKIE).as_deref(),
        Some("fresh-token")
    );
    assert_eq!(session.store().user_info().unwrap().email, "ann@example.com");
}

#[tokio::test]
async fn test_open_uses_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config = parley::config::ClientConfig::default()
        .with_base_url("http://127.0.0.1:1")
        .with_data_dir(temp_dir.path().join("state"));

    let mut session = ChatSession::open(config.clone()).unwrap();
    session.store_mut().login_success(test_user());
    let id = session.new_conversation();

    let again = ChatSession::open(config).unwrap();
    assert!(again.store().is_logged_in());
    assert_eq!(again.store().current_conversation_id(), Some(id.as_str()));
}
