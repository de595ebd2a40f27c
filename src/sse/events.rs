//! SSE line and frame types.

/// Represents a parsed SSE line
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Event type declaration (e.g., "event: data")
    Event(String),
    /// Data payload (e.g., "data: {\"type\": \"NODE_RESULT\"}")
    Data(String),
    /// Event id (e.g., "id: 42"), accepted and ignored
    Id(String),
    /// Reconnection delay hint, accepted and ignored
    Retry(String),
    /// Empty line - signals end of event
    Empty,
    /// Comment line (starts with ':')
    Comment(String),
}

/// One complete SSE event as delivered by the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseFrame {
    /// Value of the `event:` field, if the server sent one
    pub event: Option<String>,
    /// Joined `data:` lines
    pub data: String,
}

impl SseFrame {
    /// Frame with only a data payload.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    /// Name of the event, defaulting to `message` as browsers do.
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}
