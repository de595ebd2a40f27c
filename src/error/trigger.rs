//! Errors returned by the trigger call that starts a run.

use thiserror::Error;

/// Why a flow could not be triggered.
///
/// Returned as a value from [`crate::transport::FlowTransport::trigger_flow`]
/// so callers can branch on it without unwinding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerFlowError {
    /// The server answered with a non-success status: the flow id is
    /// unknown, the caller is not allowed to run it, or the inputs were
    /// rejected.
    #[error("Failed to trigger flow. Error status: {status}")]
    InvalidFlow { status: u16, message: String },

    /// The request never produced a response (connection, DNS, TLS).
    #[error("Failed to reach the flow trigger endpoint: {message}")]
    HttpFailure { message: String },
}

impl TriggerFlowError {
    /// Stable machine-readable tag, matching the JavaScript SDK's `type` field.
    pub fn error_type(&self) -> &'static str {
        match self {
            TriggerFlowError::InvalidFlow { .. } => "invalid-flow-error",
            TriggerFlowError::HttpFailure { .. } => "http-failure-error",
        }
    }
}
