//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parley::api::ApiClient;
use parley::config::ClientConfig;
use parley::cookie::{CookieJar, TOKEN_COOKIE, USER_INFO_COOKIE};
use parley::models::UserInfo;
use parley::session::ChatSession;
use parley::state::StateStore;
use parley::storage::{KeyValueStore, MemoryStore};
use wiremock::ResponseTemplate;

pub const TEST_TOKEN: &str = "test-access-token-12345";

pub fn test_user() -> UserInfo {
    UserInfo {
        user_id: "user-123".to_string(),
        email: "ann@example.com".to_string(),
        username: Some("ann".to_string()),
        is_active: true,
        created_at: None,
    }
}

/// Client against `base_url` with in-memory storage and no token.
pub fn test_client(base_url: &str) -> (ApiClient, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let cookies = CookieJar::new(storage.clone());
    let client = ApiClient::new(ClientConfig::default().with_base_url(base_url), cookies)
        .expect("client should build");
    (client, storage)
}

/// Client holding a valid token cookie.
pub fn signed_in_client(base_url: &str) -> (ApiClient, Arc<MemoryStore>) {
    let (client, storage) = test_client(base_url);
    client.cookies().set_default(TOKEN_COOKIE, TEST_TOKEN).unwrap();
    (client, storage)
}

/// Session over `storage` that is signed in as [`test_user`].
pub fn signed_in_session(base_url: &str, storage: Arc<dyn KeyValueStore>) -> ChatSession {
    let cookies = CookieJar::new(Arc::clone(&storage));
    cookies.set_default(TOKEN_COOKIE, TEST_TOKEN).unwrap();
    cookies
        .set_default(USER_INFO_COOKIE, &serde_json::to_string(&test_user()).unwrap())
        .unwrap();

    let api = ApiClient::new(ClientConfig::default().with_base_url(base_url), cookies).unwrap();
    let mut store = StateStore::load(storage);
    store.login_success(test_user());
    ChatSession::new(api, store)
}

/// Build a `data:` framed body from JSON payloads, ending with `[DONE]`.
pub fn sse_body(payloads: &[serde_json::Value]) -> String {
    let mut body: String = payloads
        .iter()
        .map(|p| format!("data: {}\n\n", p))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

pub fn sse_response(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/event-stream")
}
