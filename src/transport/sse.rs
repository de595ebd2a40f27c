//! HTTP trigger + SSE listen transport.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{CancelHandle, EventCallback, FlowTransport, TriggerOutcome, LISTEN_ERROR_MESSAGE};
use crate::channel::{EventChannel, Unsubscribe};
use crate::client::ClientAuth;
use crate::error::{ListenError, TriggerFlowError};
use crate::events::{EventKind, FlowEvent, FlowInputs, SessionId, TriggerId};
use crate::protocol::classify_frame;
use crate::reconciler::{EventReconciler, ResumeMode};
use crate::sse::{SseFrame, SseParser};
use crate::traits::{ByteStream, HttpClient, HttpError};

/// Address of one flow on the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowEndpoint {
    api_url: String,
    project_id: String,
    flow_id: String,
}

impl FlowEndpoint {
    pub fn new(
        api_url: impl Into<String>,
        project_id: impl Into<String>,
        flow_id: impl Into<String>,
    ) -> Self {
        let api_url: String = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            flow_id: flow_id.into(),
        }
    }

    fn flow_url(&self) -> String {
        format!(
            "{}/projects/{}/workflows/{}",
            self.api_url, self.project_id, self.flow_id
        )
    }

    pub fn trigger_url(&self) -> String {
        format!("{}/trigger", self.flow_url())
    }

    pub fn listen_url(&self, trigger_id: &TriggerId) -> String {
        format!("{}/listen/{}", self.flow_url(), trigger_id)
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerResponseBody {
    #[serde(default)]
    session_id: Option<String>,
}

struct Connection {
    reconciler: Arc<EventReconciler>,
    cancel: CancelHandle,
}

/// Transport talking to the Supallm API.
pub struct SseFlowTransport {
    http: Arc<dyn HttpClient>,
    endpoint: FlowEndpoint,
    auth: ClientAuth,
    inputs: FlowInputs,
    resume_mode: ResumeMode,
    channel: Arc<EventChannel<FlowEvent>>,
    connection: Mutex<Option<Connection>>,
}

impl SseFlowTransport {
    pub fn new(
        http: Arc<dyn HttpClient>,
        endpoint: FlowEndpoint,
        auth: ClientAuth,
        inputs: FlowInputs,
    ) -> Self {
        Self {
            http,
            endpoint,
            auth,
            inputs,
            resume_mode: ResumeMode::default(),
            channel: Arc::new(EventChannel::new()),
            connection: Mutex::new(None),
        }
    }

    pub fn with_resume_mode(mut self, mode: ResumeMode) -> Self {
        self.resume_mode = mode;
        self
    }

    pub fn endpoint(&self) -> &FlowEndpoint {
        &self.endpoint
    }

    /// Number of events dispatched on the current connection.
    pub fn dispatched_count(&self) -> u64 {
        self.connection
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map(|conn| conn.reconciler.dispatched_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl FlowTransport for SseFlowTransport {
    async fn trigger_flow(
        &self,
        trigger_id: &TriggerId,
        session_id: Option<&SessionId>,
    ) -> Result<TriggerOutcome, TriggerFlowError> {
        let session_id = session_id.cloned().unwrap_or_else(SessionId::generate);
        let body = serde_json::json!({
            "inputs": self.inputs,
            "triggerId": trigger_id.as_str(),
            "sessionId": session_id.as_str(),
        });

        let mut headers = self.auth.headers();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let url = self.endpoint.trigger_url();
        info!(flow_id = %self.endpoint.flow_id, %trigger_id, "Triggering flow");

        let response = self
            .http
            .post(&url, &body.to_string(), &headers)
            .await
            .map_err(|err| TriggerFlowError::HttpFailure {
                message: err.to_string(),
            })?;

        if !response.is_success() {
            warn!(status = response.status, "Flow trigger rejected");
            return Err(TriggerFlowError::InvalidFlow {
                status: response.status,
                message: response.text().unwrap_or_default(),
            });
        }

        // An empty or partial body keeps the session id we sent
        let session_id = response
            .json::<TriggerResponseBody>()
            .ok()
            .and_then(|body| body.session_id)
            .map(SessionId::from)
            .unwrap_or(session_id);

        debug!(%session_id, "Flow triggered");
        Ok(TriggerOutcome { session_id })
    }

    async fn listen_flow(&self, trigger_id: &TriggerId) -> Result<CancelHandle, ListenError> {
        let url = self.endpoint.listen_url(trigger_id);
        let mut headers = self.auth.headers();
        headers.insert("Accept".to_string(), "text/event-stream".to_string());

        debug!(%url, "Opening flow event stream");
        let stream = self
            .http
            .get_stream(&url, &headers)
            .await
            .map_err(|err| match err {
                HttpError::ServerError { status, message } => {
                    ListenError::Rejected { status, message }
                }
                other => ListenError::ConnectionFailed {
                    message: other.to_string(),
                },
            })?;

        let reconciler = Arc::new(EventReconciler::new(
            self.channel.clone(),
            self.resume_mode,
        ));
        let cancel = CancelHandle::new();
        {
            let reconciler = reconciler.clone();
            let channel = self.channel.clone();
            cancel.on_cancel(move || {
                reconciler.close();
                channel.clear();
            });
        }
        {
            let cancel = cancel.clone();
            reconciler.set_close_hook(move || cancel.cancel());
        }

        let previous = self
            .connection
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(Connection {
                reconciler: reconciler.clone(),
                cancel: cancel.clone(),
            });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        tokio::spawn(read_loop(stream, reconciler, cancel.clone()));
        Ok(cancel)
    }

    fn add_event_listener(&self, kind: EventKind, callback: EventCallback) -> Unsubscribe {
        self.channel.register(kind, callback)
    }

    fn close(&self) {
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(connection) = connection {
            connection.cancel.cancel();
        }
        self.channel.clear();
    }
}

impl Drop for SseFlowTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn handle_frame(reconciler: &EventReconciler, frame: &SseFrame) {
    match classify_frame(frame) {
        Ok(message) => reconciler.accept(message),
        Err(warning) => warn!(%warning, "Dropping stream message"),
    }
}

/// Pump the byte stream into the reconciler until a terminal event, the end
/// of the stream, or cancellation.
async fn read_loop(mut stream: ByteStream, reconciler: Arc<EventReconciler>, cancel: CancelHandle) {
    let mut parser = SseParser::new();

    loop {
        if cancel.is_cancelled() {
            debug!("Flow stream closed");
            return;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Flow stream closed");
                return;
            }
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for frame in parser.feed_bytes(&bytes) {
                        handle_frame(&reconciler, &frame);
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "Flow stream failed");
                    break;
                }
                None => {
                    if let Some(frame) = parser.finish() {
                        handle_frame(&reconciler, &frame);
                    }
                    debug!("Flow stream ended");
                    break;
                }
            }
        }
    }

    reconciler.end_of_stream();
    if !reconciler.is_closed() {
        warn!("Flow stream ended before the run finished");
        reconciler.push_live(FlowEvent::failure(LISTEN_ERROR_MESSAGE));
    }
    cancel.cancel();
}
