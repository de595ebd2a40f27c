//! Transport adapters.
//!
//! A [`FlowTransport`] owns everything one flow run needs on the wire side:
//! the trigger call, the event stream, the handler table and the
//! [`EventReconciler`](crate::reconciler::EventReconciler) sitting between
//! them. One transport serves exactly one run.
//!
//! - [`SseFlowTransport`] - triggers over HTTP and listens over SSE
//! - [`MockFlowTransport`] - offline transport streaming canned text

mod cancel;
pub mod mock;
pub mod sse;

use async_trait::async_trait;

use crate::channel::Unsubscribe;
use crate::error::{ListenError, TriggerFlowError};
use crate::events::{EventKind, FlowEvent, SessionId, TriggerId};

pub use cancel::CancelHandle;
pub use mock::MockFlowTransport;
pub use sse::{FlowEndpoint, SseFlowTransport};

/// Message of the failure synthesized when the stream ends or breaks before
/// the run reached a terminal event.
pub use crate::protocol::LISTEN_ERROR_MESSAGE;

/// Boxed handler accepted by [`FlowTransport::add_event_listener`].
pub type EventCallback = Box<dyn Fn(&FlowEvent) + Send + Sync>;

/// Successful trigger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    /// Session the run belongs to, as confirmed by the server.
    pub session_id: SessionId,
}

#[async_trait]
pub trait FlowTransport: Send + Sync {
    /// Fresh correlation token for one run attempt.
    fn generate_trigger_id(&self) -> TriggerId {
        TriggerId::generate()
    }

    /// Start the run. A session id is generated when none is supplied.
    async fn trigger_flow(
        &self,
        trigger_id: &TriggerId,
        session_id: Option<&SessionId>,
    ) -> Result<TriggerOutcome, TriggerFlowError>;

    /// Open the event stream for `trigger_id` and start dispatching.
    ///
    /// Returns once the connection is established.
    async fn listen_flow(&self, trigger_id: &TriggerId) -> Result<CancelHandle, ListenError>;

    /// Register the single handler for `kind`.
    fn add_event_listener(&self, kind: EventKind, callback: EventCallback) -> Unsubscribe;

    /// Drop every registration and buffered event, and close the stream.
    fn close(&self);
}
