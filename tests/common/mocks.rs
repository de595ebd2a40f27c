//! In-process HTTP fixtures.
//!
//! Builds a [`MockHttpClient`] answering the trigger and listen endpoints of
//! one flow, for tests that do not need a real socket.

pub use supallm::adapters::mock::{MockHttpClient, MockResponse};
pub use supallm::traits::{HttpError, Response};

use bytes::Bytes;

use super::{FLOW_ID, PROJECT_ID};

pub const MOCK_API: &str = "https://api.mock";

/// Configuration for setting up mock HTTP responses.
pub struct MockHttpConfig {
    client: MockHttpClient,
}

impl MockHttpConfig {
    pub fn new() -> Self {
        Self {
            client: MockHttpClient::new(),
        }
    }

    fn flow_url() -> String {
        format!("{}/projects/{}/workflows/{}", MOCK_API, PROJECT_ID, FLOW_ID)
    }

    /// Answer the trigger call with `status` and a JSON body.
    pub fn with_trigger(self, status: u16, json: serde_json::Value) -> Self {
        self.client.set_response(
            &format!("{}/trigger", Self::flow_url()),
            MockResponse::Success(Response::json_body(status, &json)),
        );
        self
    }

    /// Fail the trigger call without a response.
    pub fn with_trigger_error(self, error: HttpError) -> Self {
        self.client
            .set_response(&format!("{}/trigger", Self::flow_url()), MockResponse::Error(error));
        self
    }

    /// Serve the given SSE body chunks, then end the stream.
    pub fn with_stream(self, chunks: Vec<String>) -> Self {
        self.client.set_response(
            &format!("{}/listen/", Self::flow_url()),
            MockResponse::Stream(chunks.into_iter().map(Bytes::from).collect()),
        );
        self
    }

    /// Serve the given SSE body chunks and keep the stream open.
    pub fn with_open_stream(self, chunks: Vec<String>) -> Self {
        self.client.set_response(
            &format!("{}/listen/", Self::flow_url()),
            MockResponse::OpenStream(chunks.into_iter().map(Bytes::from).collect()),
        );
        self
    }

    pub fn build(self) -> MockHttpClient {
        self.client
    }
}

impl Default for MockHttpConfig {
    fn default() -> Self {
        Self::new()
    }
}
