//! Domain events for a flow run.
//!
//! This module defines the closed set of events a running flow can produce,
//! the identifiers that correlate a run with its stream, and the result
//! mapping that streamed output fragments accumulate into.
//!
//! Every wire message that survives classification becomes exactly one
//! [`FlowEvent`]. Adding a new event kind means adding a variant here, which
//! makes every exhaustive `match` in the crate a compile-time reminder.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier correlating a trigger call with its stream subscription.
///
/// Generated client-side once per run attempt and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    /// Generate a fresh random (UUID v4) trigger id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TriggerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a logical flow execution.
///
/// Either generated client-side for a first run or supplied by the caller to
/// continue a previous session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random (UUID v4) session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type tag of a streamed output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowValueType {
    Text,
    Image,
    Any,
}

impl FlowValueType {
    /// Parse a wire type tag. `"string"` is the deprecated spelling of `text`.
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "text" | "string" => Some(FlowValueType::Text),
            "image" => Some(FlowValueType::Image),
            "any" => Some(FlowValueType::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowValueType::Text => "text",
            FlowValueType::Image => "image",
            FlowValueType::Any => "any",
        }
    }
}

/// Accumulated value of one output field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    #[serde(rename = "type")]
    pub value_type: FlowValueType,
}

/// Final result of a run, keyed by output field name.
///
/// Fragments for the same field are concatenated in arrival order. The type
/// of a field is fixed by its first fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowResult {
    fields: HashMap<String, FieldValue>,
}

impl FlowResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to its field, creating the field on first sight.
    pub fn append(&mut self, field_name: &str, value: &str, value_type: FlowValueType) {
        match self.fields.get_mut(field_name) {
            Some(existing) => existing.value.push_str(value),
            None => {
                self.fields.insert(
                    field_name.to_string(),
                    FieldValue {
                        value: value.to_string(),
                        value_type,
                    },
                );
            }
        }
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldValue> {
        self.fields.get(field_name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

/// Value of one flow input. Flows only accept strings, numbers and booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl InputValue {
    /// `None` for NaN and infinities, which JSON cannot carry.
    pub fn from_f64(value: f64) -> Option<Self> {
        serde_json::Number::from_f64(value).map(InputValue::Number)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Text(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::Text(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Bool(value)
    }
}

macro_rules! input_from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for InputValue {
            fn from(value: $ty) -> Self {
                InputValue::Number(value.into())
            }
        })*
    };
}

input_from_integer!(i32, i64, u32, u64);

impl TryFrom<serde_json::Value> for InputValue {
    type Error = serde_json::Value;

    /// Arrays, objects and null are handed back unchanged.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Bool(b) => Ok(InputValue::Bool(b)),
            serde_json::Value::Number(n) => Ok(InputValue::Number(n)),
            serde_json::Value::String(s) => Ok(InputValue::Text(s)),
            other => Err(other),
        }
    }
}

/// Inputs of one run, keyed by input name.
pub type FlowInputs = BTreeMap<String, InputValue>;

/// Free-form structured payload attached to node and tool events.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Identifiers shared by every event of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventMeta {
    pub workflow_id: Option<String>,
    pub trigger_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowStartEvent {
    pub meta: EventMeta,
}

/// One incremental piece of an output field.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowResultFragment {
    pub meta: EventMeta,
    pub node_id: String,
    pub field_name: String,
    pub value: String,
    pub value_type: FlowValueType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowFailEvent {
    pub meta: EventMeta,
    pub message: String,
}

/// Terminal success event.
///
/// Events classified off the wire carry an empty `result`; the response facade
/// fills it with the accumulated result before handing it to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowEndEvent {
    pub meta: EventMeta,
    pub result: FlowResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeStartEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub node_type: Option<String>,
    pub input: Option<Payload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeEndEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub node_type: Option<String>,
    pub output: Option<Payload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeLogEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolStartEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub tool_name: String,
    pub input: Option<Payload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolEndEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub tool_name: String,
    pub output: Option<Payload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub tool_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentNotificationEvent {
    pub meta: EventMeta,
    pub node_id: String,
    pub output_field: Option<String>,
    pub data: Payload,
}

/// Kind tag of a [`FlowEvent`], used as the key of an event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FlowStart,
    FlowResultFragment,
    FlowFail,
    FlowEnd,
    NodeStart,
    NodeEnd,
    NodeFail,
    NodeLog,
    ToolStart,
    ToolEnd,
    ToolFail,
    AgentNotification,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::FlowStart,
        EventKind::FlowResultFragment,
        EventKind::FlowFail,
        EventKind::FlowEnd,
        EventKind::NodeStart,
        EventKind::NodeEnd,
        EventKind::NodeFail,
        EventKind::NodeLog,
        EventKind::ToolStart,
        EventKind::ToolEnd,
        EventKind::ToolFail,
        EventKind::AgentNotification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FlowStart => "flow-start",
            EventKind::FlowResultFragment => "flow-result-fragment",
            EventKind::FlowFail => "flow-fail",
            EventKind::FlowEnd => "flow-end",
            EventKind::NodeStart => "node-start",
            EventKind::NodeEnd => "node-end",
            EventKind::NodeFail => "node-fail",
            EventKind::NodeLog => "node-log",
            EventKind::ToolStart => "tool-start",
            EventKind::ToolEnd => "tool-end",
            EventKind::ToolFail => "tool-fail",
            EventKind::AgentNotification => "agent-notification",
        }
    }

    /// Whether this kind ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::FlowEnd | EventKind::FlowFail)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can be routed through an event channel by kind.
pub trait Tagged {
    type Kind: Copy + Eq + std::hash::Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Typed event produced by a running flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    FlowStart(FlowStartEvent),
    FlowResultFragment(FlowResultFragment),
    FlowFail(FlowFailEvent),
    FlowEnd(FlowEndEvent),
    NodeStart(NodeStartEvent),
    NodeEnd(NodeEndEvent),
    NodeFail(NodeFailEvent),
    NodeLog(NodeLogEvent),
    ToolStart(ToolStartEvent),
    ToolEnd(ToolEndEvent),
    ToolFail(ToolFailEvent),
    AgentNotification(AgentNotificationEvent),
}

impl FlowEvent {
    pub fn meta(&self) -> &EventMeta {
        match self {
            FlowEvent::FlowStart(e) => &e.meta,
            FlowEvent::FlowResultFragment(e) => &e.meta,
            FlowEvent::FlowFail(e) => &e.meta,
            FlowEvent::FlowEnd(e) => &e.meta,
            FlowEvent::NodeStart(e) => &e.meta,
            FlowEvent::NodeEnd(e) => &e.meta,
            FlowEvent::NodeFail(e) => &e.meta,
            FlowEvent::NodeLog(e) => &e.meta,
            FlowEvent::ToolStart(e) => &e.meta,
            FlowEvent::ToolEnd(e) => &e.meta,
            FlowEvent::ToolFail(e) => &e.meta,
            FlowEvent::AgentNotification(e) => &e.meta,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    /// Build a flow-fail event carrying only a message.
    pub fn failure(message: impl Into<String>) -> Self {
        FlowEvent::FlowFail(FlowFailEvent {
            meta: EventMeta::default(),
            message: message.into(),
        })
    }
}

impl Tagged for FlowEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            FlowEvent::FlowStart(_) => EventKind::FlowStart,
            FlowEvent::FlowResultFragment(_) => EventKind::FlowResultFragment,
            FlowEvent::FlowFail(_) => EventKind::FlowFail,
            FlowEvent::FlowEnd(_) => EventKind::FlowEnd,
            FlowEvent::NodeStart(_) => EventKind::NodeStart,
            FlowEvent::NodeEnd(_) => EventKind::NodeEnd,
            FlowEvent::NodeFail(_) => EventKind::NodeFail,
            FlowEvent::NodeLog(_) => EventKind::NodeLog,
            FlowEvent::ToolStart(_) => EventKind::ToolStart,
            FlowEvent::ToolEnd(_) => EventKind::ToolEnd,
            FlowEvent::ToolFail(_) => EventKind::ToolFail,
            FlowEvent::AgentNotification(_) => EventKind::AgentNotification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_values_serialize_as_plain_json() {
        let mut inputs = FlowInputs::new();
        inputs.insert("name".to_string(), "John".into());
        inputs.insert("age".to_string(), 42.into());
        inputs.insert("vip".to_string(), true.into());
        inputs.insert("ratio".to_string(), InputValue::from_f64(0.5).unwrap());

        assert_eq!(
            serde_json::to_value(&inputs).unwrap(),
            serde_json::json!({"name": "John", "age": 42, "vip": true, "ratio": 0.5})
        );
        assert!(InputValue::from_f64(f64::NAN).is_none());
    }

    #[test]
    fn test_input_value_rejects_structured_json() {
        assert_eq!(
            InputValue::try_from(serde_json::json!("x")),
            Ok(InputValue::Text("x".to_string()))
        );
        for value in [serde_json::json!(null), serde_json::json!([1]), serde_json::json!({"a": 1})] {
            assert_eq!(InputValue::try_from(value.clone()), Err(value));
        }
    }

    #[test]
    fn test_result_concatenates_fragments() {
        let mut result = FlowResult::new();
        result.append("name", "Jo", FlowValueType::Text);
        result.append("name", "hn", FlowValueType::Text);

        let field = result.get("name").unwrap();
        assert_eq!(field.value, "John");
        assert_eq!(field.value_type, FlowValueType::Text);
    }

    #[test]
    fn test_result_type_fixed_by_first_fragment() {
        let mut result = FlowResult::new();
        result.append("img", "data:", FlowValueType::Image);
        result.append("img", "abc", FlowValueType::Text);

        let field = result.get("img").unwrap();
        assert_eq!(field.value, "data:abc");
        assert_eq!(field.value_type, FlowValueType::Image);
    }

    #[test]
    fn test_result_serializes_as_plain_map() {
        let mut result = FlowResult::new();
        result.append("result", "Hi!", FlowValueType::Text);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"result": {"value": "Hi!", "type": "text"}})
        );
    }

    #[test]
    fn test_value_type_from_wire() {
        assert_eq!(FlowValueType::from_wire("text"), Some(FlowValueType::Text));
        assert_eq!(FlowValueType::from_wire("string"), Some(FlowValueType::Text));
        assert_eq!(FlowValueType::from_wire("image"), Some(FlowValueType::Image));
        assert_eq!(FlowValueType::from_wire("any"), Some(FlowValueType::Any));
        assert_eq!(FlowValueType::from_wire("video"), None);
    }

    #[test]
    fn test_trigger_ids_are_unique() {
        let a = TriggerId::generate();
        let b = TriggerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(FlowEvent::failure("boom").kind(), EventKind::FlowFail);
        assert!(FlowEvent::failure("boom").is_terminal());
        assert!(EventKind::FlowEnd.is_terminal());
        assert!(!EventKind::NodeLog.is_terminal());
        assert_eq!(EventKind::ALL.len(), 12);
    }
}
