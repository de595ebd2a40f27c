//! Error category classification for unified error handling.
//!
//! This module provides a high-level categorization of errors to enable
//! consistent handling and messaging at call sites.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport-level failures (connection refused, DNS, broken stream).
    Network,

    /// The remote side rejected the request (unknown flow, bad credentials).
    /// Not retryable without changing the request.
    Remote,

    /// API misuse, e.g. reading the session id before the run started.
    Client,

    /// Missing or invalid configuration, raised before any network activity.
    Configuration,
}

impl ErrorCategory {
    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Remote => "remote",
            ErrorCategory::Client => "client",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Check your connection to the Supallm API",
            ErrorCategory::Remote => "Check the flow id and your credentials",
            ErrorCategory::Client => "Wait for the run to start before reading its session",
            ErrorCategory::Configuration => "Check your client configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_as_str() {
        assert_eq!(ErrorCategory::Network.as_str(), "network");
        assert_eq!(ErrorCategory::Remote.as_str(), "remote");
        assert_eq!(ErrorCategory::Client.as_str(), "client");
        assert_eq!(ErrorCategory::Configuration.as_str(), "configuration");
    }

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Network), "network");
    }

    #[test]
    fn test_recovery_hints_are_present() {
        for category in [
            ErrorCategory::Network,
            ErrorCategory::Remote,
            ErrorCategory::Client,
            ErrorCategory::Configuration,
        ] {
            assert!(!category.recovery_hint().is_empty());
        }
    }
}
