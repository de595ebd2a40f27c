//! SSE stream parsing logic
//!
//! Contains the stateful SseParser for accumulating lines and emitting frames,
//! as well as the line classifier.

use super::events::{SseFrame, SseLine};

/// Strip the single optional space that follows a field colon.
fn field_value(rest: &str) -> String {
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

/// Parse a single SSE line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(field_value(rest));
    }

    if let Some(rest) = line.strip_prefix("id:") {
        return SseLine::Id(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("retry:") {
        return SseLine::Retry(rest.trim().to_string());
    }

    // Unknown field - treat as comment
    SseLine::Comment(line.to_string())
}

/// Stateful SSE parser that accumulates lines and emits complete frames
#[derive(Debug, Default)]
pub struct SseParser {
    /// Current event type being accumulated
    current_event_type: Option<String>,
    /// Accumulated data lines (SSE allows multiple data: lines)
    data_buffer: Vec<String>,
    /// Bytes of an incomplete line carried between chunks
    pending: Vec<u8>,
}

impl SseParser {
    /// Create a new SSE parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a line to the parser, potentially returning a complete frame
    ///
    /// Returns `Some(frame)` when the line terminated an event, `None` when the
    /// line was consumed but the event is still incomplete.
    pub fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        match parse_sse_line(line) {
            SseLine::Event(event_type) => {
                self.current_event_type = Some(event_type);
                None
            }
            SseLine::Data(data) => {
                self.data_buffer.push(data);
                None
            }
            SseLine::Empty => self.try_emit_frame(),
            SseLine::Id(_) | SseLine::Retry(_) | SseLine::Comment(_) => None,
        }
    }

    /// Feed a raw chunk from the network, returning every frame it completes.
    ///
    /// Chunks may split lines (and multi-byte characters) at any point; the
    /// incomplete tail is kept until the next chunk arrives.
    pub fn feed_bytes(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&raw[..newline_pos]);
            let line = line.trim_end_matches('\r').to_string();
            if let Some(frame) = self.feed_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush state at end of stream.
    ///
    /// A trailing line without newline is processed, then any accumulated
    /// event is emitted as if a blank line had followed.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
            if let Some(frame) = self.feed_line(&line) {
                return Some(frame);
            }
        }
        self.try_emit_frame()
    }

    /// Try to emit a complete frame from accumulated state
    fn try_emit_frame(&mut self) -> Option<SseFrame> {
        if self.current_event_type.is_none() && self.data_buffer.is_empty() {
            return None;
        }

        let frame = SseFrame {
            event: self.current_event_type.take(),
            data: self.data_buffer.join("\n"),
        };
        self.data_buffer.clear();
        Some(frame)
    }
}
