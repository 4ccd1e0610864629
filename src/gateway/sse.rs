//! Incremental decoder for `data:`-prefixed event lines.
//!
//! Completion providers stream newline-delimited lines of the form
//!
//! ```text
//! data: {"id":"1","choices":[...]}
//!
//! data: [DONE]
//! ```
//!
//! Each non-blank `data:` payload becomes one chunk. Lines without the prefix
//! (comments, `event:` or `id:` fields) are ignored, and the `[DONE]` sentinel
//! ends the stream.
//!
//! # Examples
//!
//! ```
//! use voxrelay::gateway::sse::decode_event_lines;
//!
//! let chunks = decode_event_lines("data: A\n\ndata: B\ndata: [DONE]\n");
//! assert_eq!(chunks, vec!["A", "B"]);
//! ```

use bytes::BytesMut;

/// Prefix marking a payload line.
pub const DATA_PREFIX: &str = "data:";

/// Payload that terminates the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Classification of one complete upstream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLine {
    /// A payload to forward as one chunk.
    Chunk(String),
    /// The end-of-stream sentinel.
    Done,
}

/// Classify one line (without its trailing newline).
///
/// Returns `None` for lines that produce nothing: blank payloads and lines
/// that do not carry the `data:` prefix.
pub fn classify_line(line: &str) -> Option<DataLine> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload == DONE_SENTINEL {
        return Some(DataLine::Done);
    }
    if payload.is_empty() {
        return None;
    }
    Some(DataLine::Chunk(payload.to_owned()))
}

/// Decode a complete buffered body into its chunks.
///
/// Anything after the sentinel is discarded.
pub fn decode_event_lines(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    for line in text.lines() {
        match classify_line(line) {
            Some(DataLine::Chunk(chunk)) => chunks.push(chunk),
            Some(DataLine::Done) => break,
            None => {}
        }
    }
    chunks
}

/// Incrementally decode event lines from arbitrary byte chunks.
///
/// Bytes are buffered until a newline arrives, so lines and multi-byte UTF-8
/// sequences split across network reads are reassembled intact.
#[derive(Debug, Default)]
pub struct EventLineDecoder {
    buffer: BytesMut,
    // Bytes of `buffer` already known to hold no newline.
    scanned: usize,
    finished: bool,
}

impl EventLineDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes, returning the lines it completed.
    ///
    /// After [`DataLine::Done`] is returned, further input is ignored.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<DataLine> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let raw = self.buffer.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            match classify_line(&text) {
                Some(DataLine::Done) => {
                    self.finish();
                    lines.push(DataLine::Done);
                    return lines;
                }
                Some(chunk) => lines.push(chunk),
                None => {}
            }
        }
        self.scanned = self.buffer.len();
        lines
    }

    /// Flush a trailing line that arrived without a newline.
    ///
    /// Call this once the byte stream reaches EOF.
    pub fn flush(&mut self) -> Option<DataLine> {
        if self.finished || self.buffer.is_empty() {
            return None;
        }
        let raw = self.buffer.split();
        self.scanned = 0;
        let line = classify_line(&String::from_utf8_lossy(&raw));
        self.finished = true;
        line
    }

    fn finish(&mut self) {
        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
    }
}
