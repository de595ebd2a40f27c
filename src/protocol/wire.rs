//! Wire message payloads.
//!
//! Internal deserialization structs for the JSON carried in each SSE `data:`
//! field. The server flattens the correlation ids at the root of every
//! message and nests the kind-specific payload under `data`.

use serde::Deserialize;

use crate::events::Payload;

/// Every tag this client understands, `RESUME` included.
pub const KNOWN_TAGS: [&str; 13] = [
    "WORKFLOW_STARTED",
    "NODE_RESULT",
    "WORKFLOW_FAILED",
    "WORKFLOW_COMPLETED",
    "NODE_STARTED",
    "NODE_COMPLETED",
    "NODE_FAILED",
    "NODE_LOG",
    "TOOL_STARTED",
    "TOOL_COMPLETED",
    "TOOL_FAILED",
    "AGENT_NOTIFICATION",
    "RESUME",
];

/// Correlation ids present at the root of every message.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeResultData {
    pub node_id: String,
    pub output_field: String,
    pub data: String,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub node_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WorkflowFailedData {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeStartedData {
    pub node_id: String,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub input: Option<Payload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeCompletedData {
    pub node_id: String,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub output: Option<Payload>,
}

/// Shared shape of `NODE_FAILED` and `NODE_LOG`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeMessageData {
    pub node_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolStartedData {
    pub node_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub input: Option<Payload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolCompletedData {
    pub node_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub output: Option<Payload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolFailedData {
    pub node_id: String,
    pub tool_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AgentNotificationData {
    pub node_id: String,
    #[serde(default)]
    pub output_field: Option<String>,
    #[serde(default)]
    pub data: Payload,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResumeData {
    pub events: Vec<serde_json::Value>,
}

/// Typed wire message, tagged by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum WireMessage {
    #[serde(rename = "WORKFLOW_STARTED")]
    WorkflowStarted {
        #[serde(flatten)]
        envelope: Envelope,
    },
    #[serde(rename = "NODE_RESULT")]
    NodeResult {
        #[serde(flatten)]
        envelope: Envelope,
        data: NodeResultData,
    },
    #[serde(rename = "WORKFLOW_FAILED")]
    WorkflowFailed {
        #[serde(flatten)]
        envelope: Envelope,
        data: WorkflowFailedData,
    },
    #[serde(rename = "WORKFLOW_COMPLETED")]
    WorkflowCompleted {
        #[serde(flatten)]
        envelope: Envelope,
    },
    #[serde(rename = "NODE_STARTED")]
    NodeStarted {
        #[serde(flatten)]
        envelope: Envelope,
        data: NodeStartedData,
    },
    #[serde(rename = "NODE_COMPLETED")]
    NodeCompleted {
        #[serde(flatten)]
        envelope: Envelope,
        data: NodeCompletedData,
    },
    #[serde(rename = "NODE_FAILED")]
    NodeFailed {
        #[serde(flatten)]
        envelope: Envelope,
        data: NodeMessageData,
    },
    #[serde(rename = "NODE_LOG")]
    NodeLog {
        #[serde(flatten)]
        envelope: Envelope,
        data: NodeMessageData,
    },
    #[serde(rename = "TOOL_STARTED")]
    ToolStarted {
        #[serde(flatten)]
        envelope: Envelope,
        data: ToolStartedData,
    },
    #[serde(rename = "TOOL_COMPLETED")]
    ToolCompleted {
        #[serde(flatten)]
        envelope: Envelope,
        data: ToolCompletedData,
    },
    #[serde(rename = "TOOL_FAILED")]
    ToolFailed {
        #[serde(flatten)]
        envelope: Envelope,
        data: ToolFailedData,
    },
    #[serde(rename = "AGENT_NOTIFICATION")]
    AgentNotification {
        #[serde(flatten)]
        envelope: Envelope,
        data: AgentNotificationData,
    },
    #[serde(rename = "RESUME")]
    Resume {
        #[serde(flatten)]
        envelope: Envelope,
        data: ResumeData,
    },
}
