//! [`HttpClient`] over reqwest.

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client. Its total request timeout, if any, also
    /// bounds how long a listen stream may stay open.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

fn request_error(err: reqwest::Error) -> HttpError {
    let message = err.to_string();
    if err.is_timeout() {
        HttpError::Timeout(message)
    } else if err.is_connect() {
        HttpError::ConnectionFailed(message)
    } else if err.is_builder() {
        HttpError::InvalidUrl(message)
    } else {
        HttpError::Other(message)
    }
}

fn chunk_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(err.to_string())
    } else {
        HttpError::Io(err.to_string())
    }
}

fn with_headers(mut builder: reqwest::RequestBuilder, headers: &Headers) -> reqwest::RequestBuilder {
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        let response = with_headers(self.client.post(url), headers)
            .body(body.to_owned())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(request_error)?;
        Ok(Response::new(status, body))
    }

    async fn get_stream(&self, url: &str, headers: &Headers) -> Result<ByteStream, HttpError> {
        let response = with_headers(self.client.get(url), headers)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HttpError::ServerError {
                status: status.as_u16(),
                message,
            });
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(chunk_error));
        Ok(Box::pin(chunks))
    }
}
