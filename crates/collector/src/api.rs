//! REST client for the source game-data HTTP endpoints.
//!
//! Wraps plain GET requests with a shared [`reqwest`] client, a request
//! timeout, and typed errors carrying the HTTP status and the full URL.

use std::time::Duration;

use serde_json::Value;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one configured source.
pub struct SourceApi {
    client: reqwest::Client,
    base_url: String,
}

/// Errors from the source API layer. Every variant names the URL it
/// failed on; the caller decides retry policy via [`FetchError::is_transient`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The HTTP request itself failed (connect, DNS, TLS, timeout).
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The source returned a non-2xx status code.
    #[error("source API error ({status}) at {url}: {body}")]
    Api { status: u16, url: String, body: String },

    /// The response body was not valid JSON.
    #[error("invalid JSON from {url}: {detail}")]
    Decode { url: String, detail: String },
}

impl FetchError {
    /// Whether the failure class is worth retrying: connection errors,
    /// timeouts, and 5xx responses. 4xx client errors never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { source, .. } => source.is_connect() || source.is_timeout(),
            Self::Api { status, .. } => *status >= 500,
            Self::Decode { .. } => false,
        }
    }

    /// The URL the failure occurred on.
    pub fn url(&self) -> &str {
        match self {
            Self::Request { url, .. } | Self::Api { url, .. } | Self::Decode { url, .. } => url,
        }
    }
}

impl SourceApi {
    /// Create an API client for a source base URL.
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across sources).
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Base HTTP URL of the source.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET request and decode the JSON response.
    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.clone(),
                source: e,
            })?;

        // The resolved URL includes the encoded query string.
        let full_url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FetchError::Api {
                status: status.as_u16(),
                url: full_url,
                body,
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Request {
            url: full_url.clone(),
            source: e,
        })?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: full_url,
            detail: e.to_string(),
        })
    }
}
