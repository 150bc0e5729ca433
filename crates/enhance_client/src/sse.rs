//! Line framing for the streamed chat-completion body.
//!
//! The provider sends `data: <json>` lines separated by blank lines and ends
//! with `data: [DONE]`. Network chunks do not respect line boundaries, so
//! [`LineBuffer`] re-assembles complete lines before [`parse_line`] classifies
//! them.

use crate::messages::ChatChunk;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// What one line of the body means for the fragment sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Blank line, non-`data: ` line, or a delta without content.
    Skip,
    /// `choices[0].delta.content` of a chunk.
    Fragment(String),
    /// `data: [DONE]`; nothing after it is read.
    Done,
}

/// Classify one complete line (without its terminator).
pub fn parse_line(line: &str) -> Result<LineEvent, String> {
    if line.is_empty() {
        return Ok(LineEvent::Skip);
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(LineEvent::Skip);
    };
    if payload == DONE_SENTINEL {
        return Ok(LineEvent::Done);
    }
    match ChatChunk::content_from_json(payload)? {
        Some(content) => Ok(LineEvent::Fragment(content)),
        None => Ok(LineEvent::Skip),
    }
}

/// Accumulates body bytes and hands out complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line it finishes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(decode_line(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// Take whatever is left after the body ended without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buffer);
        Some(decode_line(&raw))
    }
}

// Lines are split on bytes so multi-byte characters cut by a chunk boundary
// are decoded only once the whole line is present.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
