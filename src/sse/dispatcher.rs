//! Event classification and callback dispatch.
//!
//! [`StreamDecoder`] owns a [`ChunkBuffer`] and a caller-supplied
//! [`StreamHandler`]. Bytes go in, handler calls come out. The decoder also
//! enforces the termination contract: a stream ends with exactly one
//! `on_complete` or exactly one `on_error`, never both and never twice.

use super::buffer::ChunkBuffer;
use super::events::{MessageDelta, Payload, StreamEvent};
use super::line::{parse_event_line, EventLine};
use crate::error::StreamError;

/// Receiver of decoded stream events.
pub trait StreamHandler {
    /// A content fragment and/or the conversation the stream belongs to.
    fn on_message(&mut self, delta: MessageDelta);

    /// The stream ended normally (`[DONE]` or end of body).
    fn on_complete(&mut self);

    /// The transport failed; nothing further will be delivered.
    fn on_error(&mut self, error: StreamError);
}

impl<H: StreamHandler + ?Sized> StreamHandler for &mut H {
    fn on_message(&mut self, delta: MessageDelta) {
        (**self).on_message(delta)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }

    fn on_error(&mut self, error: StreamError) {
        (**self).on_error(error)
    }
}

/// Adapts three closures to [`StreamHandler`].
///
/// ```
/// use parley::sse::{StreamCallbacks, StreamDecoder};
///
/// let mut text = String::new();
/// let mut decoder = StreamDecoder::new(StreamCallbacks::new(
///     |delta: parley::sse::MessageDelta| text.push_str(delta.content.as_deref().unwrap_or("")),
///     || {},
///     |_err| {},
/// ));
/// decoder.feed(b"data: {\"type\":\"content\",\"content\":\"hi\"}\n");
/// drop(decoder);
/// assert_eq!(text, "hi");
/// ```
pub struct StreamCallbacks<M, C, E> {
    on_message: M,
    on_complete: C,
    on_error: E,
}

impl<M, C, E> StreamCallbacks<M, C, E>
where
    M: FnMut(MessageDelta),
    C: FnMut(),
    E: FnMut(StreamError),
{
    pub fn new(on_message: M, on_complete: C, on_error: E) -> Self {
        Self {
            on_message,
            on_complete,
            on_error,
        }
    }
}

impl<M, C, E> StreamHandler for StreamCallbacks<M, C, E>
where
    M: FnMut(MessageDelta),
    C: FnMut(),
    E: FnMut(StreamError),
{
    fn on_message(&mut self, delta: MessageDelta) {
        (self.on_message)(delta)
    }

    fn on_complete(&mut self) {
        (self.on_complete)()
    }

    fn on_error(&mut self, error: StreamError) {
        (self.on_error)(error)
    }
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed,
}

/// Counters kept while decoding one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderStats {
    /// `on_message` calls made
    pub messages: usize,
    /// `data:` payloads that were not valid event JSON
    pub malformed: usize,
    /// Valid payloads that produced no callback
    pub dropped: usize,
    /// Lines that were not data lines
    pub ignored_lines: usize,
}

/// Final state of a stream after the decoder closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub outcome: StreamOutcome,
    pub stats: DecoderStats,
}

/// Map a decoded payload to the delta the caller sees, if any.
///
/// Only `content` events and untagged legacy payloads may carry text. Status
/// style events contribute at most a conversation id. Empty strings count as
/// absent.
pub fn classify(payload: Payload) -> Option<MessageDelta> {
    match payload {
        Payload::Tagged(StreamEvent::Content(fields)) => non_empty(fields.content)
            .map(|content| MessageDelta::content(content, non_empty(fields.conversation_id))),
        Payload::Tagged(
            StreamEvent::Status(fields)
            | StreamEvent::Thinking(fields)
            | StreamEvent::ToolsStatus(fields)
            | StreamEvent::ResponseStart(fields),
        ) => non_empty(fields.conversation_id).map(MessageDelta::conversation),
        Payload::Tagged(StreamEvent::Unknown) => None,
        Payload::Legacy(fields) => non_empty(fields.content)
            .or_else(|| non_empty(fields.message))
            .map(|content| MessageDelta::content(content, non_empty(fields.conversation_id))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Incremental decoder for one chat stream.
pub struct StreamDecoder<H> {
    buffer: ChunkBuffer,
    handler: H,
    outcome: Option<StreamOutcome>,
    stats: DecoderStats,
}

impl<H: StreamHandler> StreamDecoder<H> {
    pub fn new(handler: H) -> Self {
        Self {
            buffer: ChunkBuffer::new(),
            handler,
            outcome: None,
            stats: DecoderStats::default(),
        }
    }

    /// Feed a body chunk.
    ///
    /// Returns `Some(outcome)` once the stream is closed; the caller should
    /// stop reading. Chunks fed after that are ignored.
    pub fn feed(&mut self, bytes: &[u8]) -> Option<StreamOutcome> {
        if self.outcome.is_some() {
            return self.outcome;
        }

        for line in self.buffer.feed(bytes) {
            match parse_event_line(&line) {
                EventLine::Data(payload) => self.dispatch(payload),
                EventLine::Done => {
                    tracing::debug!("Stream sentinel received");
                    self.complete();
                    break;
                }
                EventLine::Ignored => self.stats.ignored_lines += 1,
            }
        }

        self.outcome
    }

    /// The transport reported end of body.
    pub fn finish(&mut self) -> StreamOutcome {
        if let Some(rest) = self.buffer.finish() {
            tracing::debug!(fragment = %rest, "Discarding unterminated trailing line");
        }
        self.complete();
        self.outcome.unwrap_or(StreamOutcome::Completed)
    }

    /// The transport failed. Ignored if the stream already closed.
    pub fn fail(&mut self, error: StreamError) -> StreamOutcome {
        if let Some(outcome) = self.outcome {
            tracing::debug!(%error, "Transport error after stream closed");
            return outcome;
        }
        tracing::warn!(%error, "Chat stream failed");
        self.close(StreamOutcome::Failed);
        self.handler.on_error(error);
        StreamOutcome::Failed
    }

    /// Whether `on_complete` or `on_error` has been delivered.
    pub fn is_closed(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<StreamOutcome> {
        self.outcome
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Summary of a closed stream. A stream that is still open reports
    /// `Failed` since it never completed.
    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            outcome: self.outcome.unwrap_or(StreamOutcome::Failed),
            stats: self.stats,
        }
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    fn complete(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        self.close(StreamOutcome::Completed);
        tracing::debug!(messages = self.stats.messages, malformed = self.stats.malformed, "Chat stream completed");
        self.handler.on_complete();
    }

    fn close(&mut self, outcome: StreamOutcome) {
        self.outcome = Some(outcome);
        self.buffer = ChunkBuffer::new();
    }

    fn dispatch(&mut self, data: &str) {
        let payload = match Payload::decode(data) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.malformed += 1;
                if data.contains("\"type\"") {
                    tracing::warn!(payload = %data, error = %e, "Skipping malformed event payload");
                } else {
                    tracing::debug!(payload = %data, error = %e, "Skipping non-event payload");
                }
                return;
            }
        };

        if let Payload::Tagged(event) = &payload {
            if event.is_status() {
                let text = event
                    .fields()
                    .and_then(|f| f.message.as_deref().or(f.content.as_deref()))
                    .unwrap_or("processing");
                tracing::debug!(event_type = event.event_type_name(), status = text, "Status event");
            }
        }

        let event_type = payload.event_type_name();
        match classify(payload) {
            Some(delta) => {
                self.stats.messages += 1;
                self.handler.on_message(delta);
            }
            None => {
                self.stats.dropped += 1;
                tracing::trace!(event_type, "Event produced no message");
            }
        }
    }
}
