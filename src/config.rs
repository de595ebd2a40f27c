//! Client configuration.
//!
//! [`ClientConfig`] is built either in code with the `with_*` setters or
//! from the environment with [`ClientConfig::from_env`].
//!
//! | Variable | Setting |
//! |---|---|
//! | `SUPALLM_API_URL` | API base url (default `https://api.supallm.com`) |
//! | `SUPALLM_PROJECT_ID` | project id (required) |
//! | `SUPALLM_SECRET_KEY` | server secret key |
//! | `SUPALLM_USER_TOKEN` | browser user token |
//! | `SUPALLM_MOCKED` | `1`/`true` to use the offline transport |

use std::fmt;

use crate::error::ConfigError;
use crate::reconciler::ResumeMode;

/// Cloud API. Self-hosted deployments override it with `with_api_url` or
/// `SUPALLM_API_URL`.
pub const DEFAULT_API_URL: &str = "https://api.supallm.com";

/// Value of the `X-Request-Origin` header sent in browser mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestOrigin {
    #[default]
    Default,
    Dashboard,
}

impl RequestOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOrigin::Default => "default",
            RequestOrigin::Dashboard => "dashboard",
        }
    }
}

#[derive(Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub project_id: String,
    pub secret_key: Option<String>,
    pub user_token: Option<String>,
    pub origin: RequestOrigin,
    /// Use the offline transport instead of the API
    pub mocked: bool,
    pub resume_mode: ResumeMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            project_id: String::new(),
            secret_key: None,
            user_token: None,
            origin: RequestOrigin::Default,
            mocked: false,
            resume_mode: ResumeMode::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_user_token(mut self, user_token: impl Into<String>) -> Self {
        self.user_token = Some(user_token.into());
        self
    }

    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_mocked(mut self, mocked: bool) -> Self {
        self.mocked = mocked;
        self
    }

    pub fn with_resume_mode(mut self, mode: ResumeMode) -> Self {
        self.resume_mode = mode;
        self
    }

    /// Read the `SUPALLM_*` variables. Only the project id is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_id = non_empty_var("SUPALLM_PROJECT_ID")
            .ok_or(ConfigError::MissingSetting("SUPALLM_PROJECT_ID"))?;

        let mut config = Self::new(project_id);
        if let Some(api_url) = non_empty_var("SUPALLM_API_URL") {
            config = config.with_api_url(api_url);
        }
        if let Some(secret_key) = non_empty_var("SUPALLM_SECRET_KEY") {
            config = config.with_secret_key(secret_key);
        }
        if let Some(user_token) = non_empty_var("SUPALLM_USER_TOKEN") {
            config = config.with_user_token(user_token);
        }
        let mocked = non_empty_var("SUPALLM_MOCKED")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(config.with_mocked(mocked))
    }

    /// Check the settings every client mode needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::MissingSetting("project_id"));
        }

        let url = reqwest::Url::parse(&self.api_url).map_err(|e| ConfigError::InvalidApiUrl {
            url: self.api_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiUrl {
                url: self.api_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("project_id", &self.project_id)
            .field("secret_key", &redact(&self.secret_key))
            .field("user_token", &redact(&self.user_token))
            .field("origin", &self.origin)
            .field("mocked", &self.mocked)
            .field("resume_mode", &self.resume_mode)
            .finish()
    }
}
