//! HTTP client for the Chat Service

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::protocol::{ChatRequest, ChatResponse, ErrorBody};

/// Agent runs can take several model calls; the service bounds its own
/// provider requests, so the client waits longer than any single one.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing accepted the connection; the only error rendered as "backend unreachable"
    #[error("could not connect to {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("backend returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_connection(&self) -> bool {
        matches!(self, ClientError::Connection { .. })
    }

    fn from_send(url: &str, source: reqwest::Error) -> Self {
        let url = url.to_string();
        if source.is_connect() {
            ClientError::Connection { url, source }
        } else if source.is_timeout() {
            ClientError::Timeout { url, source }
        } else {
            ClientError::Request { url, source }
        }
    }
}

/// Something that answers chat requests on the session's behalf
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;
}

/// reqwest client for `POST {base}/chat`
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let url = format!("{}/chat", self.base_url);
        debug!(%url, model = %request.model_id, "Sending chat request");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::from_send(&url, source))?;

        let status = response.status();
        // The timeout also covers reading the body
        let body = response.text().await.map_err(|source| {
            if source.is_timeout() {
                ClientError::from_send(&url, source)
            } else {
                ClientError::Decode(source.to_string())
            }
        })?;

        if !status.is_success() {
            // Prefer the service's {"detail": ...}; fall back to the raw body
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.detail)
                .unwrap_or(body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
