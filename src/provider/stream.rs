//! Streaming response decoding.
//!
//! The provider frames its body as blank-line separated events, each carrying
//! a `data: ` payload. [`SegmentSplitter`] reassembles those events across TCP
//! chunk boundaries, [`parse_segment`] turns one event into an optional text
//! fragment, and [`relay`] drives both over a body stream into an
//! [`EventSender`].

use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::types::CompletionChunk;
use crate::chat::EventSender;

/// Upper bound on buffered bytes without an event delimiter.
const MAX_BUFFER_BYTES: usize = 1024 * 1024;

/// Literal payload the provider sends after its last chunk.
const DONE_SENTINEL: &str = "[DONE]";

/// Buffers raw bytes and yields complete events split on `\r?\n\r?\n`.
#[derive(Debug, Default)]
pub struct SegmentSplitter {
    buffer: Vec<u8>,
    /// Offset in `buffer` before which no delimiter can start.
    scanned: usize,
}

impl SegmentSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of bytes and return every event it completed.
    ///
    /// Blank events are dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut segments = Vec::new();
        let mut consumed = 0;
        let mut from = self.scanned;
        while let Some((start, end)) = find_delimiter(&self.buffer[consumed..], from) {
            let segment =
                String::from_utf8_lossy(&self.buffer[consumed..consumed + start]).into_owned();
            consumed += end;
            from = 0;
            if !segment.trim().is_empty() {
                segments.push(segment);
            }
        }
        self.buffer.drain(..consumed);

        // A delimiter completed by the next chunk starts in the last 3 bytes.
        self.scanned = self.buffer.len().saturating_sub(3);

        if self.buffer.len() > MAX_BUFFER_BYTES {
            tracing::warn!(
                bytes = self.buffer.len(),
                "Discarding oversized undelimited stream data"
            );
            self.buffer.clear();
            self.scanned = 0;
        }

        segments
    }

    /// Consume the splitter, returning any trailing event left without a
    /// closing delimiter.
    pub fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest.into_owned())
        }
    }
}

/// Locate the first `\r?\n\r?\n` in `buf` whose newline is at or after
/// `from`, returning its byte range.
///
/// A trailing `\n` or `\n\r` may still become a delimiter once more bytes
/// arrive, so it is not matched.
fn find_delimiter(buf: &[u8], mut from: usize) -> Option<(usize, usize)> {
    while let Some(offset) = buf[from..].iter().position(|&b| b == b'\n') {
        let newline = from + offset;
        let start = if newline > 0 && buf[newline - 1] == b'\r' {
            newline - 1
        } else {
            newline
        };

        match buf.get(newline + 1) {
            Some(b'\n') => return Some((start, newline + 2)),
            Some(b'\r') if buf.get(newline + 2) == Some(&b'\n') => {
                return Some((start, newline + 3))
            }
            _ => from = newline + 1,
        }
    }
    None
}

/// Decode one event into the text fragment it carries.
///
/// Returns `None` for the `[DONE]` sentinel, payloads that are not JSON,
/// payloads without `choices`, and chunks whose `finish_reason` is `"stop"`.
/// A chunk without `delta.content` yields an empty fragment.
pub fn parse_segment(segment: &str) -> Option<String> {
    let segment = segment.trim();
    let data = match segment.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        None => segment,
    };

    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }

    let chunk: CompletionChunk = serde_json::from_str(data).unwrap_or_else(|e| {
        tracing::trace!(error = %e, "Ignoring unparsable stream chunk");
        CompletionChunk::default()
    });

    let Some(choice) = chunk.choices.and_then(|c| c.into_iter().next()) else {
        tracing::trace!("Ignoring stream chunk without choices");
        return None;
    };

    if choice.finish_reason.as_deref() == Some("stop") {
        return None;
    }

    Some(choice.delta.and_then(|d| d.content).unwrap_or_default())
}

/// Forward a provider body stream into `events`.
///
/// Emits one `Message` per decoded fragment, then `Done` when the body ends
/// or `Error` if reading it fails. Stops early, without a terminal event, if
/// the receiver has been dropped.
pub async fn relay<S, E>(body: S, events: EventSender)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    let mut splitter = SegmentSplitter::new();
    let mut fragments = 0usize;

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, fragments, "Error streaming from provider");
                events.error(e.to_string());
                return;
            }
        };

        for segment in splitter.push(&bytes) {
            if let Some(content) = parse_segment(&segment) {
                if !events.message(content) {
                    tracing::debug!(fragments, "Receiver dropped, abandoning stream");
                    return;
                }
                fragments += 1;
            }
        }
    }

    if let Some(content) = splitter.finish().as_deref().and_then(parse_segment) {
        events.message(content);
        fragments += 1;
    }

    tracing::info!(fragments, "Provider stream closed");
    events.done();
}
