//! Classification of a single body line.

/// Prefix that marks a data line.
pub const DATA_PREFIX: &str = "data:";

/// Payload that ends the stream normally.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A complete line as seen by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLine<'a> {
    /// `data: <payload>` with the prefix removed
    Data(&'a str),
    /// `data: [DONE]`
    Done,
    /// Blank lines, comments, `event:` lines and anything else
    Ignored,
}

/// Parse one line (without its `\n`).
///
/// A trailing `\r` is dropped so CRLF-framed bodies parse the same way.
/// The prefix is `data:` followed by at most one space, as in SSE.
pub fn parse_event_line(line: &str) -> EventLine<'_> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return EventLine::Ignored;
    }

    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return EventLine::Ignored;
    };
    let payload = rest.strip_prefix(' ').unwrap_or(rest);

    if payload.trim() == DONE_SENTINEL {
        EventLine::Done
    } else {
        EventLine::Data(payload)
    }
}
