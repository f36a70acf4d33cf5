//! Transfers one artifact to the saver endpoint with a bounded timeout and
//! exponential-backoff retry.

mod retry;
mod transport;

pub use retry::RetryPolicy;
pub use transport::{AttemptError, HttpTransport, UploadResponse, UploadTransport};

use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::config::UploadConfig;
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// A file produced for a completed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes: body.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Upload failed: {filename} after {attempts} attempt(s): {last}")]
    Exhausted {
        filename: String,
        attempts: u32,
        last: AttemptError,
    },
}

#[derive(Clone)]
pub struct UploadClient {
    transport: Arc<dyn UploadTransport>,
    policy: RetryPolicy,
    timeout: Duration,
    local_dev: bool,
    simulated_delay: Duration,
}

impl UploadClient {
    pub fn new(transport: Arc<dyn UploadTransport>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            policy,
            timeout,
            local_dev: false,
            simulated_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        let transport: Arc<dyn UploadTransport> = Arc::new(HttpTransport::new(config.endpoint.clone()));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: &UploadConfig, transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            transport,
            policy: config.retry_policy(),
            timeout: config.timeout(),
            local_dev: config.local_dev,
            simulated_delay: config.simulated_delay(),
        }
    }

    /// Report a simulated URL instead of touching the network.
    pub fn local_dev(mut self, simulated_delay: Duration) -> Self {
        self.local_dev = true;
        self.simulated_delay = simulated_delay;
        self
    }

    /// Upload `artifact` and return the stored URL.
    pub async fn upload(&self, artifact: &Artifact) -> Result<String, UploadError> {
        if self.local_dev {
            tokio::time::sleep(self.simulated_delay).await;
            log_info!("Local development: simulated upload of {}", artifact.filename);
            return Ok(format!("http://localhost/simulated/{}", artifact.filename));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.attempt(artifact).await {
                Ok(url) => {
                    log_info!("Uploaded {} (attempt {attempt})", artifact.filename);
                    return Ok(url);
                }
                Err(err) => err,
            };

            log_warn!("Attempt {attempt} for {} failed: {error}", artifact.filename);

            if !self.policy.should_retry(attempt) {
                return Err(UploadError::Exhausted {
                    filename: artifact.filename.clone(),
                    attempts: attempt,
                    last: error,
                });
            }

            tokio::time::sleep(self.policy.delay_after(attempt)).await;
        }
    }

    async fn attempt(&self, artifact: &Artifact) -> Result<String, AttemptError> {
        let response = tokio::time::timeout(self.timeout, self.transport.send(artifact))
            .await
            .map_err(|_| AttemptError::Timeout)??;

        if !response.success {
            let reason = response.error.unwrap_or_else(|| "success was false".to_string());
            return Err(AttemptError::Refused(reason));
        }

        Ok(response.url.unwrap_or_default())
    }
}
