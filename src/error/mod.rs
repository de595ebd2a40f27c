//! Error handling for the Supallm SDK.
//!
//! This module provides:
//!
//! - **Trigger errors**: [`TriggerFlowError`] distinguishes an invalid flow
//!   (the server answered with a non-success status) from an HTTP failure
//!   (no answer at all)
//! - **Stream errors**: [`ListenError`] when the stream cannot be opened, and
//!   [`ParseWarning`] for messages that are logged and dropped
//! - **Configuration errors**: [`ConfigError`], raised before any network call
//! - **Unified error type**: [`FlowError`], returned by the response facade
//!
//! # Error Categories
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Connection, DNS, broken stream | Yes |
//! | Remote | Unknown flow, rejected credentials | No |
//! | Client | API misuse | No |
//! | Configuration | Missing credentials or settings | No |

mod category;
mod config;
mod flow_error;
mod stream;
mod trigger;

pub use category::ErrorCategory;
pub use config::ConfigError;
pub use flow_error::FlowError;
pub use stream::{ListenError, ParseWarning};
pub use trigger::TriggerFlowError;

pub use crate::traits::HttpError;
