//! Newline-delimited JSON decoding.
//!
//! The response body arrives as arbitrary chunks. [`LineDecoder`] keeps the
//! bytes after the last newline until the rest of the line shows up, so a
//! record split across chunks (or a multi-byte character split across
//! chunks) is decoded exactly once, after its delimiter arrives.
//!
//! [`decode_stream`] wraps any chunk stream (for example
//! `reqwest::Response::bytes_stream`) into a stream of parsed values.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

/// A line that was not valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed line {line:?}: {reason}")]
pub struct MalformedLine {
    /// The offending line, trimmed.
    pub line: String,
    /// Parser error message.
    pub reason: String,
}

/// Outcome of decoding one non-blank line.
pub type DecodedLine = std::result::Result<Value, MalformedLine>;

/// Incremental splitter and parser for newline-delimited JSON.
///
/// Invariant: the internal buffer never contains a `\n`; everything up to
/// the last delimiter has already been handed out by [`LineDecoder::push`].
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed, in order.
    ///
    /// Blank lines are skipped. A line that fails to parse is returned as an
    /// `Err` and does not affect the lines around it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedLine> {
        let mut lines = Vec::new();
        let mut line_start = 0;
        // Bytes already buffered hold no delimiter, so only the new chunk is scanned.
        let mut cursor = self.buffer.len();

        self.buffer.extend_from_slice(chunk);

        while let Some(offset) = self.buffer[cursor..].iter().position(|&b| b == b'\n') {
            let newline = cursor + offset;
            if let Some(decoded) = decode_line(&self.buffer[line_start..newline]) {
                lines.push(decoded);
            }
            line_start = newline + 1;
            cursor = line_start;
        }

        self.buffer.drain(..line_start);
        lines
    }

    /// Signal end of stream and decode whatever follows the last delimiter.
    ///
    /// Returns `None` when the residual is empty or only whitespace.
    #[must_use]
    pub fn finish(self) -> Option<DecodedLine> {
        decode_line(&self.buffer)
    }

    /// Number of bytes waiting for a delimiter.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Parse a single line, or `None` if it is blank.
fn decode_line(bytes: &[u8]) -> Option<DecodedLine> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(serde_json::from_str(trimmed).map_err(|e| MalformedLine {
        line: trimmed.to_string(),
        reason: e.to_string(),
    }))
}

/// Error item yielded by [`decode_stream`].
#[derive(Debug, thiserror::Error)]
pub enum StreamError<E> {
    /// One line was not valid JSON. Decoding continues after it.
    #[error(transparent)]
    Malformed(MalformedLine),

    /// The underlying chunk stream failed. This is the last item.
    #[error("transport error: {0}")]
    Transport(E),
}

impl<E> StreamError<E> {
    /// Whether the stream ends after this item.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

struct DecodeState<S> {
    chunks: S,
    /// `None` once the chunk stream has ended or failed.
    decoder: Option<LineDecoder>,
    ready: VecDeque<DecodedLine>,
}

/// Decode a stream of byte chunks into a stream of JSON values.
///
/// Every line completed by a chunk is yielded before the next chunk is
/// polled. When the chunk stream ends, a non-blank trailing line without a
/// delimiter is parsed as the final item. A transport error is yielded once
/// and ends the stream; its partial line is discarded. Dropping the returned
/// stream discards any buffered partial line without parsing it.
pub fn decode_stream<S, B, E>(chunks: S) -> impl Stream<Item = Result<Value, StreamError<E>>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = DecodeState {
        chunks,
        decoder: Some(LineDecoder::new()),
        ready: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.ready.pop_front() {
                return Some((line.map_err(StreamError::Malformed), state));
            }

            let decoder = state.decoder.as_mut()?;
            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    state.ready.extend(decoder.push(chunk.as_ref()));
                }
                Some(Err(err)) => {
                    if decoder.buffered_len() > 0 {
                        tracing::debug!(
                            discarded = decoder.buffered_len(),
                            "Dropping partial line after transport error"
                        );
                    }
                    state.decoder = None;
                    return Some((Err(StreamError::Transport(err)), state));
                }
                None => {
                    if let Some(line) = state.decoder.take().and_then(LineDecoder::finish) {
                        state.ready.push_back(line);
                    }
                }
            }
        }
    })
}
