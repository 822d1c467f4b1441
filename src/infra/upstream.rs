//! Outbound client for the upstream domain API.
//!
//! Owns base-URL joining, service-auth attachment, and error translation.
//! The cache layer treats the produced payloads as opaque and never retries
//! or caches a failure; whatever this client reports is what the caller sees.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::error::InfraError;

/// Failure reported by the upstream API. Cloneable so a single-flight cache
/// fill can hand the same error to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("upstream call aborted: {0}")]
    Aborted(String),
}

impl UpstreamError {
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted(message.into())
    }

    /// The upstream HTTP status, when the failure carried one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(error: reqwest::Error) -> Self {
        UpstreamError::Transport(error.to_string())
    }
}

/// Thin `reqwest` wrapper for the remote domain API.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: Url, timeout: Duration, service_token: Option<String>) -> Result<Self, InfraError> {
        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(ACCEPT, reqwest::header::HeaderValue::from_static("application/json"));
        if let Some(token) = service_token {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| InfraError::configuration(format!("invalid service token: {err}")))?;
            default_headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;

        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| UpstreamError::Transport(format!("invalid path `{path}`: {err}")))
    }

    /// GET a JSON payload, passed through as opaque bytes.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Bytes, UpstreamError> {
        let url = self.endpoint(path)?;
        debug!(target = "varco::upstream", %url, "GET");
        let mut request = self.http.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        Self::into_payload(request.send().await?).await
    }

    /// Send a mutation with an optional JSON body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Bytes, UpstreamError> {
        let url = self.endpoint(path)?;
        debug!(target = "varco::upstream", %method, %url, "send");
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::into_payload(request.send().await?).await
    }

    async fn into_payload(response: reqwest::Response) -> Result<Bytes, UpstreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.bytes().await?);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unreadable body>"));
        Err(UpstreamError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        let base = Url::parse("https://api.example.test/v2/").expect("base url");
        ApiClient::new(base, Duration::from_secs(5), Some("svc-token".into())).expect("client")
    }

    #[test]
    fn endpoint_joins_relative_to_base() {
        let client = client();
        let url = client.endpoint("/users/42").expect("endpoint");
        assert_eq!(url.as_str(), "https://api.example.test/v2/users/42");
    }

    #[test]
    fn status_error_exposes_code() {
        let err = UpstreamError::Status {
            status: 404,
            message: "not found".into(),
        };
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(UpstreamError::Transport("timeout".into()).status_code(), None);
    }

    #[test]
    fn invalid_service_token_is_a_configuration_error() {
        let base = Url::parse("https://api.example.test/").expect("base url");
        let result = ApiClient::new(base, Duration::from_secs(5), Some("bad\ntoken".into()));
        assert!(result.is_err());
    }
}
