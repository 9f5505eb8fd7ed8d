//! Async read loop feeding a [`StreamDecoder`] from a byte stream.

use std::time::Duration;

use futures_util::{pin_mut, Stream, StreamExt};

use super::dispatcher::{StreamDecoder, StreamHandler, StreamSummary};
use crate::error::StreamError;

/// Read `body` to the end, dispatching events to `handler`.
///
/// Each chunk is fully processed before the next read is issued. The loop
/// stops as soon as the decoder closes (sentinel, end of body, transport
/// error or read timeout) and drops `body`, which releases the underlying
/// connection. `read_timeout` of `None` waits for data indefinitely.
pub async fn drive_stream<S, B, E, H>(
    body: S,
    handler: H,
    read_timeout: Option<Duration>,
) -> StreamSummary
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    H: StreamHandler,
{
    pin_mut!(body);
    let mut decoder = StreamDecoder::new(handler);

    loop {
        let next = match read_timeout {
            Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                Ok(item) => item,
                Err(_) => {
                    decoder.fail(StreamError::timeout(limit));
                    break;
                }
            },
            None => body.next().await,
        };

        match next {
            Some(Ok(chunk)) => {
                if decoder.feed(chunk.as_ref()).is_some() {
                    break;
                }
            }
            Some(Err(e)) => {
                decoder.fail(StreamError::transport(e));
                break;
            }
            None => {
                decoder.finish();
                break;
            }
        }
    }

    decoder.summary()
}
