use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::header::ACCEPT;

use super::ApiClient;
use crate::error::ApiError;
use crate::models::{is_placeholder_id, ChatRequest};
use crate::sse::{drive_stream, StreamHandler, StreamSummary};

/// Marks a client as streaming for as long as it lives.
struct StreamGuard {
    flag: Arc<AtomicBool>,
}

impl StreamGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl ApiClient {
    /// Whether a chat stream is running on this client or one of its clones.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// POST /chat and feed the reply stream into `handler`.
    ///
    /// Errors before the body starts (connection, non-2xx status) are
    /// returned as `Err` and `handler` is never called. Once the body is
    /// streaming, the outcome is reported through the handler and the
    /// returned summary. Only one stream may run per client at a time;
    /// a second call fails with [`ApiError::StreamInProgress`].
    ///
    /// Locally assigned conversation ids are not sent, so the backend opens
    /// a new conversation for them.
    pub async fn stream_chat<H: StreamHandler>(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        handler: H,
    ) -> Result<StreamSummary, ApiError> {
        let _guard = StreamGuard::acquire(&self.streaming).ok_or(ApiError::StreamInProgress)?;

        let conversation_id = conversation_id
            .filter(|id| !id.is_empty() && !is_placeholder_id(id))
            .map(str::to_string);
        tracing::info!(
            conversation_id = conversation_id.as_deref().unwrap_or("<new>"),
            chars = message.chars().count(),
            "Starting chat stream"
        );
        let request = ChatRequest::new(message, conversation_id).with_model(&self.config.model);

        let builder = self
            .authorize(self.client.post(self.url("/chat")))
            .header(ACCEPT, "text/event-stream")
            .json(&request);
        let response = self.check_status(builder.send().await?).await?;

        let summary = drive_stream(
            response.bytes_stream(),
            handler,
            self.config.stream_read_timeout,
        )
        .await;
        tracing::info!(
            outcome = ?summary.outcome,
            messages = summary.stats.messages,
            malformed = summary.stats.malformed,
            "Chat stream finished"
        );
        Ok(summary)
    }
}
