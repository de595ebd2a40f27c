//! SSE (Server-Sent Events) stream framing
//!
//! Turns the raw byte stream of a `text/event-stream` response into frames.
//! SSE format consists of:
//! - `event: <type>` - event type line
//! - `data: <json>` - data payload line (may repeat, joined with `\n`)
//! - `id: <id>` and `retry: <ms>` - accepted and ignored
//! - Empty line - signals end of event
//! - Lines starting with `:` - comments (ignored)
//!
//! Frames carry the payload verbatim; turning a frame into a flow event is
//! the job of [`crate::protocol`].
//!
//! # Module structure
//! - `events` - Line and frame types (SseLine, SseFrame)
//! - `parser` - Parsing logic (SseParser, parse_sse_line)

mod events;
mod parser;

pub use events::{SseFrame, SseLine};
pub use parser::{parse_sse_line, SseParser};
