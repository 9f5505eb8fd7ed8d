//! Integration tests for chat streaming over HTTP.
//!
//! The mock server answers `POST /chat` with a `data:` framed body and the
//! tests check what reaches the handler.

mod common;

use std::time::Duration;

use common::{signed_in_client, sse_body, sse_response, TEST_TOKEN};
use parley::error::{ApiError, StreamError};
use parley::models::Conversation;
use parley::sse::{MessageDelta, StreamHandler, StreamOutcome};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default)]
struct Recorder {
    deltas: Vec<MessageDelta>,
    completed: usize,
    errors: Vec<StreamError>,
}

impl Recorder {
    fn text(&self) -> String {
        self.deltas
            .iter()
            .filter_map(|d| d.content.as_deref())
            .collect()
    }
}

impl StreamHandler for Recorder {
    fn on_message(&mut self, delta: MessageDelta) {
        self.deltas.push(delta);
    }

    fn on_complete(&mut self) {
        self.completed += 1;
    }

    fn on_error(&mut self, error: StreamError) {
        self.errors.push(error);
    }
}

async fn mount_chat(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stream_content_and_status_events() {
    let mock_server = MockServer::start().await;
    let body = sse_body(&[
        json!({"type": "response_start", "conversation_id": "c1"}),
        json!({"type": "status", "message": "thinking", "conversation_id": "c1"}),
        json!({"type": "content", "content": "Hel", "conversation_id": "c1"}),
        json!({"type": "tools_status", "message": "searching"}),
        json!({"type": "content", "content": "lo", "conversation_id": "c1"}),
    ]);
    mount_chat(&mock_server, body).await;

    let (client, _) = signed_in_client(&mock_server.uri());
    let mut recorder = Recorder::default();
    let summary = client
        .stream_chat("hi", Some("c1"), &mut recorder)
        .await
        .unwrap();

    assert_eq!(summary.outcome, StreamOutcome::Completed);
    assert_eq!(recorder.text(), "Hello");
    assert_eq!(recorder.completed, 1);
    assert!(recorder.errors.is_empty());
    // response_start and status carry only the id; tools_status without id is dropped
    assert_eq!(recorder.deltas.len(), 4);
    assert_eq!(recorder.deltas[1], MessageDelta::conversation("c1"));
    assert_eq!(summary.stats.dropped, 1);
}

#[tokio::test]
async fn test_request_shape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("authorization", format!("Bearer {}", TEST_TOKEN).as_str()))
        .and(header("accept", "text/event-stream"))
        .and(body_json(json!({
            "message": "hello",
            "conversation_id": "c1",
            "model": "deepseek-chat",
            "stream": true
        })))
        .respond_with(sse_response(sse_body(&[])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = signed_in_client(&mock_server.uri());
    let mut recorder = Recorder::default();
    client
        .stream_chat("hello", Some("c1"), &mut recorder)
        .await
        .unwrap();
    assert_eq!(recorder.completed, 1);
}

#[tokio::test]
async fn test_placeholder_conversation_is_not_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({
            "message": "first",
            "model": "deepseek-chat",
            "stream": true
        })))
        .respond_with(sse_response(sse_body(&[
            json!({"type": "content", "content": "ok", "conversation_id": "real-1"}),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = signed_in_client(&mock_server.uri());
    let placeholder = Conversation::placeholder();
    let mut recorder = Recorder::default();
    client
        .stream_chat("first", Some(&placeholder.conversation_id), &mut recorder)
        .await
        .unwrap();
    assert_eq!(
        recorder.deltas[0].conversation_id.as_deref(),
        Some("real-1")
    );
}

#[tokio::test]
async fn test_legacy_and_malformed_lines() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        ": keep-alive\n",
        "data: {\"message\":\"legacy text\"}\n",
        "data: {not json}\n",
        // Status event glued to the next one by a missing newline
        "data: {\"type\":\"status\",\"message\":\"x\"}data: {\"type\":\"content\"}\n",
        "data: {\"type\":\"content\",\"content\":\" after\"}\n",
        "data: [DONE]\n",
        "data: {\"type\":\"content\",\"content\":\"ignored\"}\n",
    );
    mount_chat(&mock_server, body.to_string()).await;

    let (client, _) = signed_in_client(&mock_server.uri());
    let mut recorder = Recorder::default();
    let summary = client
        .stream_chat("hi", None, &mut recorder)
        .await
        .unwrap();

    assert_eq!(recorder.text(), "legacy text after");
    assert_eq!(recorder.deltas[0].conversation_id, None);
    assert_eq!(recorder.completed, 1);
    assert_eq!(summary.stats.malformed, 2);
    assert_eq!(summary.stats.ignored_lines, 1);
}

#[tokio::test]
async fn test_body_without_sentinel_completes_once() {
    let mock_server = MockServer::start().await;
    mount_chat(
        &mock_server,
        "data: {\"type\":\"content\",\"content\":\"a\"}\n".to_string(),
    )
    .await;

    let (client, _) = signed_in_client(&mock_server.uri());
    let mut recorder = Recorder::default();
    client
        .stream_chat("hi", None, &mut recorder)
        .await
        .unwrap();
    assert_eq!(recorder.text(), "a");
    assert_eq!(recorder.completed, 1);
}

#[tokio::test]
async fn test_http_error_skips_handler() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "model offline"})))
        .mount(&mock_server)
        .await;

    let (client, _) = signed_in_client(&mock_server.uri());
    let mut recorder = Recorder::default();
    let err = client
        .stream_chat("hi", None, &mut recorder)
        .await
        .unwrap_err();

    assert!(matches!(&err, ApiError::Server { status: 500, message } if message == "model offline"));
    assert_eq!(recorder.completed, 0);
    assert!(recorder.errors.is_empty());
    assert!(!client.is_streaming());
}

#[tokio::test]
async fn test_second_stream_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(sse_body(&[json!({"content": "slow"})])).set_delay(Duration::from_millis(300)))
        .mount(&mock_server)
        .await;

    let (client, _) = signed_in_client(&mock_server.uri());
    let other = client.clone();
    let mut first = Recorder::default();
    let mut second = Recorder::default();

    let (first_result, second_result) = futures::future::join(
        client.stream_chat("one", None, &mut first),
        async {
            // Let the first request take the stream slot
            tokio::time::sleep(Duration::from_millis(50)).await;
            other.stream_chat("two", None, &mut second).await
        },
    )
    .await;

    assert!(first_result.is_ok());
    assert!(matches!(second_result, Err(ApiError::StreamInProgress)));
    assert_eq!(first.text(), "slow");
    assert!(second.deltas.is_empty());
    assert!(!client.is_streaming());
}
