//! Line-delimited wire format for [`StreamChunk`]s.
//!
//! The server writes one JSON object per line. Readers feed arbitrary byte
//! segments into a [`LineDecoder`], which yields complete lines and keeps the
//! partial tail until more bytes (or end of stream) arrive.

use bytes::{Bytes, BytesMut};

use crate::error::Result;
use crate::types::StreamChunk;

/// MIME type of the identification stream.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Serialize one chunk as a newline-terminated line.
pub fn encode_line(chunk: &StreamChunk) -> Result<Bytes> {
    let mut line = serde_json::to_vec(chunk)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Parse one line, tolerating surrounding noise.
///
/// Blank and unparseable lines yield `None`. When the line is not a chunk on
/// its own, the span between the first `{` and the last `}` is tried.
pub fn parse_line(line: &str) -> Option<StreamChunk> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(chunk) = serde_json::from_str::<StreamChunk>(line) {
        return Some(chunk);
    }

    let island = match (line.find('{'), line.rfind('}')) {
        (Some(start), Some(end)) if end > start => &line[start..=end],
        _ => {
            tracing::debug!(line = %truncate(line), "Dropping non-JSON stream line");
            return None;
        }
    };

    match serde_json::from_str::<StreamChunk>(island) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::debug!(line = %truncate(line), error = %e, "Dropping unparseable stream line");
            None
        }
    }
}

fn truncate(line: &str) -> &str {
    match line.char_indices().nth(120) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

/// Incremental newline splitter.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment and return every chunk completed by it, in order.
    pub fn push(&mut self, segment: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(segment);

        let mut chunks = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            if let Some(chunk) = decode_bytes(&line[..pos]) {
                chunks.push(chunk);
            }
        }
        chunks
    }

    /// Flush the remainder at end of stream.
    pub fn finish(&mut self) -> Option<StreamChunk> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = self.buffer.split();
        decode_bytes(&rest)
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_bytes(line: &[u8]) -> Option<StreamChunk> {
    match std::str::from_utf8(line) {
        Ok(text) => parse_line(text),
        Err(e) => {
            tracing::debug!(error = %e, "Dropping non-UTF-8 stream line");
            None
        }
    }
}
