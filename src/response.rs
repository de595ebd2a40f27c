//! Caller-facing handle on one flow run.
//!
//! A [`FlowResponse`] offers two ways to consume the same run:
//!
//! - [`FlowResponse::subscribe`] returns a [`FlowSubscription`] to register
//!   per-kind handlers, fire-and-forget style
//! - [`FlowResponse::wait`] resolves once with the final [`FlowOutcome`]
//!
//! Either call starts the run; the run is only ever started once per
//! response, however many times and in whichever order they are called.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{watch, OnceCell};
use tracing::{error, info, warn};

use crate::accumulator::{ResultAccumulator, RunStatus};
use crate::channel::{EventChannel, Unsubscribe};
use crate::error::FlowError;
use crate::events::{EventKind, FlowEndEvent, FlowEvent, FlowResult, SessionId, Tagged};
use crate::transport::{CancelHandle, FlowTransport};

/// Final state of a run. A remote failure is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    Success { result: FlowResult },
    Failure { error: String },
}

impl FlowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FlowOutcome::Success { .. })
    }

    pub fn result(&self) -> Option<&FlowResult> {
        match self {
            FlowOutcome::Success { result } => Some(result),
            FlowOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FlowOutcome::Success { .. } => None,
            FlowOutcome::Failure { error } => Some(error),
        }
    }
}

type Resolution = Option<Result<FlowOutcome, FlowError>>;

/// State touched by the transport's handlers.
struct RunState {
    accumulator: Mutex<ResultAccumulator>,
    observers: EventChannel<FlowEvent>,
    outcome: watch::Sender<Resolution>,
}

impl RunState {
    fn accumulator(&self) -> MutexGuard<'_, ResultAccumulator> {
        self.accumulator.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn handle(&self, event: &FlowEvent) {
        let outcome = self.accumulator().apply(event);

        // Subscribers get the flow-end event with the accumulated result
        let completed = match (event, &outcome) {
            (FlowEvent::FlowEnd(end), Some(FlowOutcome::Success { result })) => {
                Some(FlowEvent::FlowEnd(FlowEndEvent {
                    meta: end.meta.clone(),
                    result: result.clone(),
                }))
            }
            _ => None,
        };
        let delivered = completed.as_ref().unwrap_or(event);

        let emitted = panic::catch_unwind(AssertUnwindSafe(|| self.observers.emit(delivered)));
        if emitted.is_err() {
            error!(kind = %event.kind(), "Flow event handler panicked");
        }

        if let Some(outcome) = outcome {
            match &outcome {
                FlowOutcome::Success { result } => {
                    info!(fields = result.len(), "Flow run completed")
                }
                FlowOutcome::Failure { error } => warn!(%error, "Flow run failed"),
            }
            self.resolve(Ok(outcome));
        }
    }

    /// First resolution wins.
    fn resolve(&self, resolution: Result<FlowOutcome, FlowError>) -> bool {
        self.outcome.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(resolution);
            true
        })
    }
}

struct Inner {
    transport: Arc<dyn FlowTransport>,
    requested_session: Option<SessionId>,
    started: OnceCell<Result<SessionId, FlowError>>,
    state: Arc<RunState>,
    cancel: Mutex<Option<CancelHandle>>,
    cancelled: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.transport.close();
    }
}

/// Handle on one flow run. Clones share the run.
#[derive(Clone)]
pub struct FlowResponse {
    inner: Arc<Inner>,
}

impl FlowResponse {
    /// Wrap a transport dedicated to this run.
    ///
    /// `session_id` continues an existing session; `None` starts a new one.
    pub fn new(transport: Arc<dyn FlowTransport>, session_id: Option<SessionId>) -> Self {
        let (outcome, _) = watch::channel(None);
        let state = Arc::new(RunState {
            accumulator: Mutex::new(ResultAccumulator::new()),
            observers: EventChannel::new(),
            outcome,
        });

        for kind in EventKind::ALL {
            let state = state.clone();
            transport.add_event_listener(
                kind,
                Box::new(move |event: &FlowEvent| state.handle(event)),
            );
        }

        Self {
            inner: Arc::new(Inner {
                transport,
                requested_session: session_id,
                started: OnceCell::new(),
                state,
                cancel: Mutex::new(None),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Start the run in the background and return a handle for handlers.
    ///
    /// Handlers only see events dispatched after they are registered;
    /// register them right away.
    pub fn subscribe(&self) -> FlowSubscription {
        let response = self.clone();
        tokio::spawn(async move {
            if let Err(err) = response.start().await {
                warn!(error = %err, "Flow run did not start");
            }
        });
        FlowSubscription {
            response: self.clone(),
        }
    }

    /// Start the run if needed and wait for its outcome.
    ///
    /// Trigger and stream setup failures are returned as `Err`; a run that
    /// fails remotely is `Ok(FlowOutcome::Failure)`.
    pub async fn wait(&self) -> Result<FlowOutcome, FlowError> {
        self.start().await?;

        let mut outcome = self.inner.state.outcome.subscribe();
        let resolved = outcome
            .wait_for(|resolution| resolution.is_some())
            .await
            .map_err(|_| FlowError::Cancelled)?
            .clone();
        resolved.unwrap_or(Err(FlowError::Cancelled))
    }

    /// Session of this run, available once the trigger call succeeded.
    pub fn session_id(&self) -> Result<SessionId, FlowError> {
        match self.inner.started.get() {
            Some(started) => started.clone(),
            None => Err(FlowError::SessionNotStarted),
        }
    }

    pub fn status(&self) -> RunStatus {
        self.inner.state.accumulator().status()
    }

    /// Snapshot of the result accumulated so far.
    pub fn result(&self) -> FlowResult {
        self.inner.state.accumulator().result().clone()
    }

    /// Stop the run's stream. Pending `wait` calls return
    /// [`FlowError::Cancelled`] unless the run already finished.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if let Some(cancel) = self.lock_cancel().as_ref() {
            cancel.cancel();
        }
        if self.inner.state.resolve(Err(FlowError::Cancelled)) {
            info!("Flow run cancelled");
        }
    }

    fn lock_cancel(&self) -> MutexGuard<'_, Option<CancelHandle>> {
        self.inner.cancel.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn start(&self) -> Result<SessionId, FlowError> {
        self.inner
            .started
            .get_or_init(|| async {
                let started = self.run().await;
                if let Err(err) = &started {
                    self.inner.state.resolve(Err(err.clone()));
                }
                started
            })
            .await
            .clone()
    }

    /// Listen first, then trigger, so no event can be emitted before the
    /// stream is attached.
    async fn run(&self) -> Result<SessionId, FlowError> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Err(FlowError::Cancelled);
        }

        let transport = &self.inner.transport;
        let trigger_id = transport.generate_trigger_id();
        let cancel = transport.listen_flow(&trigger_id).await?;
        *self.lock_cancel() = Some(cancel.clone());

        if self.inner.cancelled.load(Ordering::SeqCst) {
            cancel.cancel();
            return Err(FlowError::Cancelled);
        }

        match transport
            .trigger_flow(&trigger_id, self.inner.requested_session.as_ref())
            .await
        {
            Ok(outcome) => {
                info!(session_id = %outcome.session_id, %trigger_id, "Flow run started");
                Ok(outcome.session_id)
            }
            Err(err) => {
                error!(error = %err, error_type = err.error_type(), "Failed to trigger flow");
                cancel.cancel();
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for FlowResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowResponse")
            .field("status", &self.status())
            .field("started", &self.inner.started.initialized())
            .finish()
    }
}

/// Registration handle returned by [`FlowResponse::subscribe`].
#[derive(Clone)]
pub struct FlowSubscription {
    response: FlowResponse,
}

impl FlowSubscription {
    /// Register the handler for `kind`, replacing any previous one.
    ///
    /// The flow-end event passed to the handler carries the full result.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Unsubscribe
    where
        F: Fn(&FlowEvent) + Send + Sync + 'static,
    {
        self.response.inner.state.observers.register(kind, handler)
    }

    /// Wait for the start sequence; yields the session id or the trigger
    /// error.
    pub async fn started(&self) -> Result<SessionId, FlowError> {
        self.response.start().await
    }

    pub fn response(&self) -> &FlowResponse {
        &self.response
    }
}

impl std::fmt::Debug for FlowSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowSubscription").finish_non_exhaustive()
    }
}
