//! Entry points for running flows.
//!
//! [`SupallmClient`] holds the project settings and credentials and builds a
//! fresh [`FlowResponse`] (with its own transport) for every run.
//!
//! ```ignore
//! use supallm::{ClientConfig, RunFlowParams, SupallmClient};
//!
//! let client = SupallmClient::server(ClientConfig::new("proj").with_secret_key("sk"))?;
//! let outcome = client
//!     .run(RunFlowParams::new("flow-id").with_input("name", "John Doe"))?
//!     .wait()
//!     .await?;
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::adapters::ReqwestHttpClient;
use crate::config::{ClientConfig, RequestOrigin};
use crate::error::ConfigError;
use crate::events::{FlowInputs, InputValue, SessionId};
use crate::response::FlowResponse;
use crate::traits::{Headers, HttpClient};
use crate::transport::{FlowEndpoint, FlowTransport, MockFlowTransport, SseFlowTransport};

/// Credentials attached to every trigger and stream request.
#[derive(Clone, PartialEq, Eq)]
pub enum ClientAuth {
    /// Static project secret; never ship it to end users.
    Server { secret_key: String },
    /// End-user token issued by the project's auth provider.
    Browser {
        user_token: String,
        origin: RequestOrigin,
    },
}

impl ClientAuth {
    pub fn server(secret_key: impl Into<String>) -> Self {
        ClientAuth::Server {
            secret_key: secret_key.into(),
        }
    }

    pub fn browser(user_token: impl Into<String>, origin: RequestOrigin) -> Self {
        ClientAuth::Browser {
            user_token: user_token.into(),
            origin,
        }
    }

    pub fn headers(&self) -> Headers {
        let mut headers = Headers::new();
        match self {
            ClientAuth::Server { secret_key } => {
                headers.insert("X-Secret-Key".to_string(), secret_key.clone());
            }
            ClientAuth::Browser { user_token, origin } => {
                headers.insert(
                    "Authorization".to_string(),
                    format!("Bearer {}", user_token),
                );
                headers.insert("X-Request-Origin".to_string(), origin.as_str().to_string());
            }
        }
        headers
    }
}

impl fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientAuth::Server { .. } => f.write_str("ClientAuth::Server"),
            ClientAuth::Browser { origin, .. } => f
                .debug_struct("ClientAuth::Browser")
                .field("origin", origin)
                .finish_non_exhaustive(),
        }
    }
}

/// What to run.
#[derive(Debug, Clone, Default)]
pub struct RunFlowParams {
    pub flow_id: String,
    pub inputs: FlowInputs,
    /// Continue an existing session instead of starting a new one.
    pub session_id: Option<SessionId>,
}

impl RunFlowParams {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn with_inputs(mut self, inputs: FlowInputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    Server,
    Browser,
}

pub struct SupallmClient {
    config: ClientConfig,
    mode: ClientMode,
    user_token: Mutex<Option<String>>,
    http: Arc<dyn HttpClient>,
}

impl SupallmClient {
    /// Client for trusted environments, authenticated by the secret key.
    pub fn server(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.secret_key.is_none() && !config.mocked {
            return Err(ConfigError::MissingSecretKey);
        }
        Ok(Self::with_mode(config, ClientMode::Server))
    }

    /// Client acting for an end user. A user token must be set, in the
    /// config or with [`SupallmClient::set_user_token`], before `run`.
    pub fn browser(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_mode(config, ClientMode::Browser))
    }

    fn with_mode(config: ClientConfig, mode: ClientMode) -> Self {
        Self {
            user_token: Mutex::new(config.user_token.clone()),
            config,
            mode,
            http: Arc::new(ReqwestHttpClient::new()),
        }
    }

    /// Replace the HTTP client used for new runs.
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self
    }

    pub fn set_user_token(&self, user_token: impl Into<String>) {
        *self.user_token.lock().unwrap_or_else(|p| p.into_inner()) = Some(user_token.into());
    }

    pub fn mode(&self) -> ClientMode {
        self.mode
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn auth(&self) -> Result<ClientAuth, ConfigError> {
        match self.mode {
            ClientMode::Server => self
                .config
                .secret_key
                .clone()
                .map(ClientAuth::server)
                .ok_or(ConfigError::MissingSecretKey),
            ClientMode::Browser => self
                .user_token
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone()
                .map(|token| ClientAuth::browser(token, self.config.origin))
                .ok_or(ConfigError::MissingUserToken),
        }
    }

    /// Prepare a run. Nothing is sent until the response is subscribed to
    /// or waited on.
    pub fn run(&self, params: RunFlowParams) -> Result<FlowResponse, ConfigError> {
        if params.flow_id.trim().is_empty() {
            return Err(ConfigError::MissingSetting("flow_id"));
        }

        let transport: Arc<dyn FlowTransport> = if self.config.mocked {
            info!(flow_id = %params.flow_id, "Running flow against the offline transport");
            Arc::new(MockFlowTransport::new())
        } else {
            let auth = self.auth()?;
            let endpoint = FlowEndpoint::new(
                self.config.api_url.as_str(),
                self.config.project_id.as_str(),
                params.flow_id.as_str(),
            );
            Arc::new(
                SseFlowTransport::new(self.http.clone(), endpoint, auth, params.inputs)
                    .with_resume_mode(self.config.resume_mode),
            )
        };

        Ok(FlowResponse::new(transport, params.session_id))
    }
}

impl fmt::Debug for SupallmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupallmClient")
            .field("mode", &self.mode)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockHttpClient, MockResponse};
    use crate::traits::Response;

    #[test]
    fn test_server_requires_secret_key() {
        let err = SupallmClient::server(ClientConfig::new("p")).unwrap_err();
        assert_eq!(err, ConfigError::MissingSecretKey);

        assert!(SupallmClient::server(ClientConfig::new("p").with_mocked(true)).is_ok());
    }

    #[tokio::test]
    async fn test_browser_requires_user_token_before_run() {
        let client = SupallmClient::browser(ClientConfig::new("p")).unwrap();
        let err = client.run(RunFlowParams::new("f")).unwrap_err();
        assert_eq!(err, ConfigError::MissingUserToken);

        client.set_user_token("jwt");
        assert!(client.run(RunFlowParams::new("f")).is_ok());
    }

    #[test]
    fn test_run_requires_flow_id() {
        let client = SupallmClient::server(ClientConfig::new("p").with_secret_key("sk")).unwrap();
        assert_eq!(
            client.run(RunFlowParams::new(" ")).unwrap_err(),
            ConfigError::MissingSetting("flow_id")
        );
    }

    #[test]
    fn test_auth_headers() {
        let server = ClientAuth::server("sk").headers();
        assert_eq!(server.get("X-Secret-Key"), Some(&"sk".to_string()));
        assert!(!server.contains_key("Authorization"));

        let browser = ClientAuth::browser("jwt", RequestOrigin::Dashboard).headers();
        assert_eq!(browser.get("Authorization"), Some(&"Bearer jwt".to_string()));
        assert_eq!(browser.get("X-Request-Origin"), Some(&"dashboard".to_string()));
    }

    #[test]
    fn test_auth_debug_hides_secrets() {
        let debug = format!("{:?}", ClientAuth::browser("jwt-secret", RequestOrigin::Default));
        assert!(!debug.contains("jwt-secret"));
    }

    #[test]
    fn test_run_params_builder() {
        let params = RunFlowParams::new("f")
            .with_input("name", "John")
            .with_input("age", 42)
            .with_input("admin", true)
            .with_session_id("s1");
        assert_eq!(params.inputs["name"], InputValue::from("John"));
        assert_eq!(params.inputs["age"], InputValue::from(42));
        assert_eq!(params.inputs["admin"], InputValue::Bool(true));
        assert_eq!(params.session_id.unwrap().as_str(), "s1");
    }

    #[tokio::test]
    async fn test_browser_run_sends_bearer_token() {
        let http = MockHttpClient::new();
        http.set_response(
            "https://api.test/projects/p/workflows/f/trigger",
            MockResponse::Success(Response::json_body(200, &serde_json::json!({"sessionId": "s"}))),
        );
        http.set_response(
            "https://api.test/projects/p/workflows/f/listen/",
            MockResponse::Stream(vec![bytes::Bytes::from(
                "data: {\"type\":\"WORKFLOW_COMPLETED\"}\n\n",
            )]),
        );

        let client = SupallmClient::browser(
            ClientConfig::new("p")
                .with_api_url("https://api.test")
                .with_user_token("jwt"),
        )
        .unwrap()
        .with_http_client(Arc::new(http.clone()));

        let outcome = client.run(RunFlowParams::new("f")).unwrap().wait().await.unwrap();
        assert!(outcome.is_success());
        for request in http.get_requests() {
            assert_eq!(request.headers.get("Authorization"), Some(&"Bearer jwt".to_string()));
            assert_eq!(request.headers.get("X-Request-Origin"), Some(&"default".to_string()));
        }
    }
}
