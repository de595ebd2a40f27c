//! Prelude module for convenient imports.
//!
//! ```ignore
//! use supallm::prelude::*;
//! ```

pub use crate::client::{ClientAuth, RunFlowParams, SupallmClient};
pub use crate::config::{ClientConfig, RequestOrigin};
pub use crate::error::{ConfigError, FlowError, TriggerFlowError};
pub use crate::events::{
    EventKind, FieldValue, FlowEvent, FlowInputs, FlowResult, FlowValueType, InputValue, SessionId,
};
pub use crate::response::{FlowOutcome, FlowResponse, FlowSubscription};
pub use crate::accumulator::RunStatus;
