//! Unified error type for the response facade.
//!
//! `FlowError` is what `FlowResponse::wait` and friends return. A flow that
//! fails remotely is *not* a `FlowError`; it is a normal
//! [`crate::response::FlowOutcome::Failure`].

use thiserror::Error;

use super::category::ErrorCategory;
use super::config::ConfigError;
use super::stream::ListenError;
use super::trigger::TriggerFlowError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error(transparent)]
    Trigger(#[from] TriggerFlowError),

    #[error(transparent)]
    Listen(#[from] ListenError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session id was read before the trigger call succeeded.
    #[error("The session id is only available once the flow has been triggered successfully")]
    SessionNotStarted,

    /// The run was cancelled before it produced an outcome.
    #[error("The flow run was cancelled")]
    Cancelled,
}

impl FlowError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::Trigger(TriggerFlowError::InvalidFlow { .. }) => ErrorCategory::Remote,
            FlowError::Trigger(TriggerFlowError::HttpFailure { .. }) => ErrorCategory::Network,
            FlowError::Listen(ListenError::Rejected { .. }) => ErrorCategory::Remote,
            FlowError::Listen(ListenError::ConnectionFailed { .. }) => ErrorCategory::Network,
            FlowError::Config(_) => ErrorCategory::Configuration,
            FlowError::SessionNotStarted | FlowError::Cancelled => ErrorCategory::Client,
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            FlowError::Trigger(err) => err.error_type(),
            FlowError::Listen(ListenError::Rejected { .. }) => "listen-rejected",
            FlowError::Listen(ListenError::ConnectionFailed { .. }) => "listen-connection-failed",
            FlowError::Config(_) => "config-error",
            FlowError::SessionNotStarted => "session-not-started",
            FlowError::Cancelled => "cancelled",
        }
    }

    /// Neither trigger error is retried by the SDK itself; this only tells
    /// callers whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Network
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_errors_keep_taxonomy() {
        let invalid: FlowError = TriggerFlowError::InvalidFlow {
            status: 404,
            message: String::new(),
        }
        .into();
        let http: FlowError = TriggerFlowError::HttpFailure {
            message: "refused".to_string(),
        }
        .into();

        assert_eq!(invalid.category(), ErrorCategory::Remote);
        assert_eq!(invalid.error_code(), "invalid-flow-error");
        assert!(!invalid.is_retryable());

        assert_eq!(http.category(), ErrorCategory::Network);
        assert_eq!(http.error_code(), "http-failure-error");
        assert!(http.is_retryable());
    }

    #[test]
    fn test_transparent_display() {
        let err: FlowError = ConfigError::MissingSecretKey.into();
        assert_eq!(err.to_string(), ConfigError::MissingSecretKey.to_string());
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_session_not_started() {
        let err = FlowError::SessionNotStarted;
        assert_eq!(err.category(), ErrorCategory::Client);
        assert_eq!(err.error_code(), "session-not-started");
    }
}
