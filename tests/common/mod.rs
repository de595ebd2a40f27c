//! Common test utilities for integration tests.
//!
//! Wire message builders, SSE body encoding and wiremock helpers shared by
//! the flow tests.
//!
//! # Example
//!
//! ```ignore
//! let server = MockServer::start().await;
//! mount_trigger(&server, "s1").await;
//! mount_listen(&server, sse_body(&[workflow_started(), workflow_completed()])).await;
//! ```

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use serde_json::{json, Value};
use supallm::{ClientConfig, SupallmClient};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROJECT_ID: &str = "proj-test";
pub const FLOW_ID: &str = "flow-test";
pub const SECRET_KEY: &str = "sk-test-12345";

pub fn trigger_path() -> String {
    format!("/projects/{}/workflows/{}/trigger", PROJECT_ID, FLOW_ID)
}

pub fn listen_path_pattern() -> String {
    format!(
        r"^/projects/{}/workflows/{}/listen/[0-9a-f-]+$",
        PROJECT_ID, FLOW_ID
    )
}

/// Encode messages as an SSE body, one `data:` frame each.
pub fn sse_body(messages: &[Value]) -> String {
    messages
        .iter()
        .map(|m| format!("data: {}\n\n", m))
        .collect()
}

pub fn workflow_started() -> Value {
    json!({"type": "WORKFLOW_STARTED", "workflowId": FLOW_ID, "sessionId": "s1"})
}

pub fn node_result(field: &str, value: &str) -> Value {
    json!({
        "type": "NODE_RESULT",
        "workflowId": FLOW_ID,
        "sessionId": "s1",
        "data": {
            "nodeId": "llm-1",
            "nodeType": "chat-openai",
            "outputField": field,
            "data": value,
            "type": "text"
        }
    })
}

pub fn workflow_failed(message: &str) -> Value {
    json!({"type": "WORKFLOW_FAILED", "workflowId": FLOW_ID, "data": {"message": message}})
}

pub fn workflow_completed() -> Value {
    json!({"type": "WORKFLOW_COMPLETED", "workflowId": FLOW_ID, "sessionId": "s1"})
}

pub fn node_log(message: &str) -> Value {
    json!({"type": "NODE_LOG", "data": {"nodeId": "llm-1", "message": message}})
}

pub fn resume(events: Vec<Value>) -> Value {
    json!({"type": "RESUME", "data": {"events": events}})
}

/// Server-mode client pointed at the mock server.
pub fn server_client(server: &MockServer) -> SupallmClient {
    SupallmClient::server(
        ClientConfig::new(PROJECT_ID)
            .with_api_url(server.uri())
            .with_secret_key(SECRET_KEY),
    )
    .expect("valid test config")
}

/// Accept the trigger call and confirm `session_id`.
pub async fn mount_trigger(server: &MockServer, session_id: &str) {
    Mock::given(method("POST"))
        .and(path(trigger_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionId": session_id})))
        .mount(server)
        .await;
}

/// Serve `body` as the event stream of any trigger id.
pub async fn mount_listen(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path_regex(listen_path_pattern()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}
