use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::constants;
use crate::error::{OssError, Result};

/// Thin wrapper over `reqwest` shared by every stage client.
///
/// Owns the base URL and the per-request timeout; stage clients own the
/// mapping from HTTP status to their own error kinds.
#[derive(Clone, Debug)]
pub struct VendorClient {
    client: Client,
    base_url: Url,
}

impl VendorClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("oss-meter-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OssError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve path segments against the base URL, percent-encoding each one
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                OssError::Configuration(format!("Base URL cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send with a fresh correlation id.
    ///
    /// Connection failures and timeouts come back as [`OssError::Transport`];
    /// any HTTP status is returned to the caller for mapping.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request_id = Uuid::new_v4().to_string();
        let response = request
            .header(constants::api::REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OssError::Transport(format!("request {} timed out", request_id))
                } else {
                    OssError::Transport(format!("request {} failed: {}", request_id, e))
                }
            })?;

        debug!(
            request_id = %request_id,
            status = %response.status(),
            url = %response.url().path(),
            "Vendor API responded"
        );

        Ok(response)
    }

    /// Decode a successful JSON body
    pub async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            OssError::Transport(format!("Failed to read response body ({}): {}", status, e))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            OssError::UnexpectedResponse(format!("Malformed {} response body: {}", status, e))
        })
    }

    /// Short description of an error response, for error messages only
    pub async fn describe_failure(response: Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body = body.trim();
        if body.is_empty() {
            status.to_string()
        } else {
            let snippet: String = body.chars().take(200).collect();
            format!("{}: {}", status, snippet)
        }
    }
}

/// Server-side failures worth treating like a transport problem
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
