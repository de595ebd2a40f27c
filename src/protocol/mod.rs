//! Classification of stream messages into flow events.
//!
//! Each SSE frame carries one JSON message tagged by a `type` discriminant
//! from a closed set (see [`KNOWN_TAGS`]). A frame either becomes one live
//! [`FlowEvent`], or, for the distinguished `RESUME` message, an ordered
//! snapshot of events the client may have missed.
//!
//! The server may also end a run with a bare SSE event named `complete` or
//! `error` whose data carries no `type`. Those frames become flow-end and
//! flow-fail respectively.
//!
//! Anything that fails validation yields a [`ParseWarning`]. Callers log the
//! warning and drop the message; nothing here is ever surfaced as an error.

mod wire;

pub use wire::KNOWN_TAGS;

use serde_json::Value;
use tracing::warn;

use crate::error::ParseWarning;
use crate::events::{
    AgentNotificationEvent, EventMeta, FlowEndEvent, FlowEvent, FlowFailEvent, FlowResult,
    FlowResultFragment, FlowStartEvent, FlowValueType, NodeEndEvent, NodeFailEvent, NodeLogEvent,
    NodeStartEvent, ToolEndEvent, ToolFailEvent, ToolStartEvent,
};
use crate::sse::SseFrame;
use wire::{Envelope, WireMessage};

/// Outcome of classifying one stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// A single event pushed live by the server.
    Live(FlowEvent),
    /// Backlog of events that happened before this subscription attached,
    /// in server order. Malformed entries have already been dropped.
    Resume(Vec<FlowEvent>),
}

/// Message of a flow-fail that carries no message of its own.
pub const LISTEN_ERROR_MESSAGE: &str = "An error occurred while listening to the flow.";

const COMPLETE_EVENT: &str = "complete";
const ERROR_EVENT: &str = "error";

/// Classify an SSE frame.
pub fn classify_frame(frame: &SseFrame) -> Result<Classified, ParseWarning> {
    if let Some(event) = named_terminal(frame) {
        return Ok(Classified::Live(event));
    }
    if frame.data.trim().is_empty() {
        return Err(ParseWarning::MissingData {
            event: frame.event_name().to_string(),
        });
    }
    classify_message(&frame.data)
}

/// A `complete` or `error` event whose data is not a typed message.
fn named_terminal(frame: &SseFrame) -> Option<FlowEvent> {
    let name = frame.event_name();
    if name != COMPLETE_EVENT && name != ERROR_EVENT {
        return None;
    }

    let body: Option<Value> = serde_json::from_str(&frame.data).ok();
    if let Some(Value::String(_)) = body.as_ref().and_then(|b| b.get("type")) {
        return None;
    }

    let envelope = body
        .as_ref()
        .and_then(|b| serde_json::from_value::<Envelope>(b.clone()).ok())
        .unwrap_or_default();

    let event = if name == COMPLETE_EVENT {
        FlowEvent::FlowEnd(FlowEndEvent {
            meta: meta(envelope),
            result: FlowResult::new(),
        })
    } else {
        let message = body
            .as_ref()
            .and_then(|b| b.get("message").or_else(|| b.pointer("/data/message")))
            .and_then(Value::as_str)
            .unwrap_or(LISTEN_ERROR_MESSAGE);
        FlowEvent::FlowFail(FlowFailEvent {
            meta: meta(envelope),
            message: message.to_string(),
        })
    };
    Some(event)
}

/// Classify the JSON text of one message.
pub fn classify_message(data: &str) -> Result<Classified, ParseWarning> {
    let value: Value = serde_json::from_str(data).map_err(|e| ParseWarning::InvalidJson {
        source_message: e.to_string(),
    })?;

    match decode(value)? {
        WireMessage::Resume { data, .. } => {
            let events = data
                .events
                .into_iter()
                .filter_map(|entry| match classify_resume_entry(entry) {
                    Ok(event) => Some(event),
                    Err(warning) => {
                        warn!(%warning, "Dropping malformed entry from resume snapshot");
                        None
                    }
                })
                .collect();
            Ok(Classified::Resume(events))
        }
        message => into_event(message).map(Classified::Live),
    }
}

fn classify_resume_entry(entry: Value) -> Result<FlowEvent, ParseWarning> {
    match decode(entry)? {
        WireMessage::Resume { .. } => Err(ParseWarning::NestedResume),
        message => into_event(message),
    }
}

/// Check the discriminant against the closed set, then the payload shape.
fn decode(value: Value) -> Result<WireMessage, ParseWarning> {
    let tag = match value.get("type") {
        Some(Value::String(tag)) => tag.clone(),
        _ => return Err(ParseWarning::MissingType),
    };

    if !KNOWN_TAGS.contains(&tag.as_str()) {
        return Err(ParseWarning::UnknownType(tag));
    }

    serde_json::from_value(value).map_err(|e| ParseWarning::InvalidPayload {
        message_type: tag,
        reason: e.to_string(),
    })
}

fn meta(envelope: Envelope) -> EventMeta {
    EventMeta {
        workflow_id: envelope.workflow_id,
        trigger_id: envelope.trigger_id,
        session_id: envelope.session_id,
    }
}

fn into_event(message: WireMessage) -> Result<FlowEvent, ParseWarning> {
    let event = match message {
        WireMessage::WorkflowStarted { envelope } => FlowEvent::FlowStart(FlowStartEvent {
            meta: meta(envelope),
        }),
        WireMessage::NodeResult { envelope, data } => {
            let value_type = FlowValueType::from_wire(&data.value_type).ok_or_else(|| {
                ParseWarning::InvalidPayload {
                    message_type: "NODE_RESULT".to_string(),
                    reason: format!("unsupported value type '{}'", data.value_type),
                }
            })?;
            FlowEvent::FlowResultFragment(FlowResultFragment {
                meta: meta(envelope),
                node_id: data.node_id,
                field_name: data.output_field,
                value: data.data,
                value_type,
            })
        }
        WireMessage::WorkflowFailed { envelope, data } => FlowEvent::FlowFail(FlowFailEvent {
            meta: meta(envelope),
            message: data.message,
        }),
        WireMessage::WorkflowCompleted { envelope } => FlowEvent::FlowEnd(FlowEndEvent {
            meta: meta(envelope),
            result: FlowResult::new(),
        }),
        WireMessage::NodeStarted { envelope, data } => FlowEvent::NodeStart(NodeStartEvent {
            meta: meta(envelope),
            node_id: data.node_id,
            node_type: data.node_type,
            input: data.input,
        }),
        WireMessage::NodeCompleted { envelope, data } => FlowEvent::NodeEnd(NodeEndEvent {
            meta: meta(envelope),
            node_id: data.node_id,
            node_type: data.node_type,
            output: data.output,
        }),
        WireMessage::NodeFailed { envelope, data } => FlowEvent::NodeFail(NodeFailEvent {
            meta: meta(envelope),
            node_id: data.node_id,
            message: data.message,
        }),
        WireMessage::NodeLog { envelope, data } => FlowEvent::NodeLog(NodeLogEvent {
            meta: meta(envelope),
            node_id: data.node_id,
            message: data.message,
        }),
        WireMessage::ToolStarted { envelope, data } => FlowEvent::ToolStart(ToolStartEvent {
            meta: meta(envelope),
            node_id: data.node_id,
            tool_name: data.tool_name,
            input: data.input,
        }),
        WireMessage::ToolCompleted { envelope, data } => FlowEvent::ToolEnd(ToolEndEvent {
            meta: meta(envelope),
            node_id: data.node_id,
            tool_name: data.tool_name,
            output: data.output,
        }),
        WireMessage::ToolFailed { envelope, data } => FlowEvent::ToolFail(ToolFailEvent {
            meta: meta(envelope),
            node_id: data.node_id,
            tool_name: data.tool_name,
            message: data.message,
        }),
        WireMessage::AgentNotification { envelope, data } => {
            FlowEvent::AgentNotification(AgentNotificationEvent {
                meta: meta(envelope),
                node_id: data.node_id,
                output_field: data.output_field,
                data: data.data,
            })
        }
        WireMessage::Resume { .. } => return Err(ParseWarning::NestedResume),
    };
    Ok(event)
}
