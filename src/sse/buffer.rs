//! Line reassembly for a chunked response body.
//!
//! Transport reads land on arbitrary byte boundaries: in the middle of a
//! line, in the middle of a multi-byte UTF-8 character, or exactly on a
//! newline. [`ChunkBuffer`] hides all of that and yields whole lines.

use std::borrow::Cow;

/// Accumulates body chunks and splits them into complete lines.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    /// Text after the last newline seen so far
    remainder: String,
    /// Leading bytes of a UTF-8 sequence cut off by the previous read
    pending: Vec<u8>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, without the
    /// terminating `\n`.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD. A sequence that is merely
    /// incomplete at the end of the chunk is held back until the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.decode(bytes);

        let Some(last_newline) = self.remainder.rfind('\n') else {
            return Vec::new();
        };

        let tail = self.remainder.split_off(last_newline + 1);
        let mut complete = std::mem::replace(&mut self.remainder, tail);
        complete.pop();

        complete.split('\n').map(String::from).collect()
    }

    /// Text buffered after the last newline.
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.remainder.is_empty() && self.pending.is_empty()
    }

    /// End of stream: drop whatever partial line is left and return it.
    ///
    /// Servers always terminate the last line, so a leftover fragment is a
    /// truncated event and is never dispatched.
    pub fn finish(&mut self) -> Option<String> {
        self.pending.clear();
        let rest = std::mem::take(&mut self.remainder);
        (!rest.is_empty()).then_some(rest)
    }

    fn decode(&mut self, bytes: &[u8]) {
        let input: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(bytes)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            Cow::Owned(joined)
        };

        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.remainder.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, invalid) = rest.split_at(e.valid_up_to());
                    self.remainder.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            self.remainder.push(char::REPLACEMENT_CHARACTER);
                            rest = &invalid[len..];
                        }
                        None => {
                            self.pending = invalid.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}
