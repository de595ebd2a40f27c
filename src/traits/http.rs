//! The HTTP seam of the crate.
//!
//! A run issues exactly two requests: the trigger POST, read in full, and the
//! listen GET, whose body is consumed as a byte stream. Production code goes
//! through [`crate::adapters::ReqwestHttpClient`]; tests inject
//! [`crate::adapters::MockHttpClient`].

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

pub type Headers = HashMap<String, String>;

/// Listen body, in the chunks the network delivered them.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// Fully read reply to a POST.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: Bytes) -> Self {
        Self { status, body }
    }

    /// Reply whose body is `value` serialized.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, Bytes::from(value.to_string()))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Why a request produced no usable reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("could not connect: {0}")]
    ConnectionFailed(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Only [`HttpClient::get_stream`] reports a status this way.
    #[error("stream refused with status {status}: {message}")]
    ServerError { status: u16, message: String },

    /// The stream broke after it was opened.
    #[error("stream read failed: {0}")]
    Io(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST `body` and read the whole reply.
    ///
    /// Every status comes back as `Ok`; `Err` means there was no reply.
    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError>;

    /// GET `url` and hand back its body as it arrives.
    ///
    /// A non-2xx status is [`HttpError::ServerError`] carrying the body text.
    async fn get_stream(&self, url: &str, headers: &Headers) -> Result<ByteStream, HttpError>;
}
