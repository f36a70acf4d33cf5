use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use super::Artifact;

/// Why a single transfer attempt failed. Every variant is retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error("Request timeout - please check your connection")]
    Timeout,
    #[error("network error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("upload refused: {0}")]
    Refused(String),
    #[error("invalid upload response: {0}")]
    Encoding(String),
}

/// Body returned by the saver endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One network transfer of one artifact. Timeouts and retries are applied by
/// the caller.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(&self, artifact: &Artifact) -> Result<UploadResponse, AttemptError>;
}

/// Multipart POST with a single `file` field.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(&self, artifact: &Artifact) -> Result<UploadResponse, AttemptError> {
        let part = Part::bytes(artifact.bytes.clone())
            .file_name(artifact.filename.clone())
            .mime_str(artifact.content_type)
            .map_err(|err| AttemptError::Encoding(err.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AttemptError::Timeout
                } else {
                    AttemptError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AttemptError::Transport(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<UploadResponse>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(AttemptError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|err| AttemptError::Encoding(err.to_string()))
    }
}
