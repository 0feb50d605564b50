//! Failures of the remote collaborators: beacon node, execution node and explorer.
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: StatusCode },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("json-rpc {method} failed with code {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("json-rpc {method} returned no result for {param}")]
    MissingResult { method: String, param: String },
    #[error("explorer api error: {0}")]
    Explorer(String),
}

impl UpstreamError {
    pub fn is_decode(&self) -> bool {
        matches!(self, UpstreamError::Decode { .. })
    }
}

/// One pooled client per process, shared by every gateway. The timeout bounds each
/// individual upstream call.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

pub(crate) async fn send(
    url: &str,
    request: reqwest::RequestBuilder,
) -> Result<Response, UpstreamError> {
    request.send().await.map_err(|source| UpstreamError::Http {
        url: url.to_string(),
        source,
    })
}

/// Reads the body as text first so schema mismatches surface as `Decode` rather than
/// as transport failures.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    url: &str,
    response: Response,
) -> Result<T, UpstreamError> {
    let body = response.text().await.map_err(|source| UpstreamError::Http {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|err| UpstreamError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    })
}

pub(crate) fn unexpected_status(url: &str, response: &Response) -> UpstreamError {
    UpstreamError::Status {
        url: url.to_string(),
        status: response.status(),
    }
}
