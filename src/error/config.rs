//! Configuration errors, raised synchronously before any network activity.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("The secret key is required when using Supallm from the server.")]
    MissingSecretKey,

    #[error("A user token is required to run a flow from the browser. Set it with set_user_token.")]
    MissingUserToken,

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid API url '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },
}
