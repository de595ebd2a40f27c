//! Streaming-related error types.
//!
//! [`ListenError`] is returned when the event stream cannot be opened.
//! [`ParseWarning`] describes a stream message that was dropped; it is
//! logged, never raised, so older clients keep working when the server
//! introduces new message kinds.

use thiserror::Error;

/// The event stream could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenError {
    /// The server refused the subscription.
    #[error("Stream endpoint returned status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Connection-level failure while opening the stream.
    #[error("Failed to open event stream: {message}")]
    ConnectionFailed { message: String },
}

/// Reason a stream message was discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseWarning {
    #[error("Received empty stream message (event '{event}')")]
    MissingData { event: String },

    #[error("Received non-JSON stream message: {source_message}")]
    InvalidJson { source_message: String },

    #[error("Received stream message without a type discriminant")]
    MissingType,

    #[error("Received unrecognized event type '{0}'")]
    UnknownType(String),

    #[error("Received malformed '{message_type}' event: {reason}")]
    InvalidPayload { message_type: String, reason: String },

    #[error("Received a resume snapshot nested inside another resume snapshot")]
    NestedResume,
}
