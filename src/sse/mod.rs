//! Streaming chat response decoder.
//!
//! The chat endpoint answers with a long-lived body of `data:` lines:
//!
//! ```text
//! data: {"type":"status","message":"Processing your message..."}
//!
//! data: {"type":"content","content":"Hi","conversation_id":"c1"}
//!
//! data: [DONE]
//! ```
//!
//! Bytes flow through the pipeline
//! `ChunkBuffer -> parse_event_line -> Payload::decode -> classify -> StreamHandler`.
//!
//! # Module structure
//! - `buffer` - Line reassembly across arbitrary chunk boundaries
//! - `line` - Data line / sentinel recognition
//! - `events` - Event types and payload decoding
//! - `dispatcher` - Classification, callbacks and one-shot termination
//! - `driver` - Async read loop over a byte stream

mod buffer;
mod dispatcher;
mod driver;
mod events;
mod line;

pub use buffer::ChunkBuffer;
pub use dispatcher::{
    classify, DecoderStats, StreamCallbacks, StreamDecoder, StreamHandler, StreamOutcome,
    StreamSummary,
};
pub use driver::drive_stream;
pub use events::{EventFields, MessageDelta, Payload, StreamEvent};
pub use line::{parse_event_line, EventLine, DATA_PREFIX, DONE_SENTINEL};
