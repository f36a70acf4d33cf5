use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::buffer::DEFAULT_CAPACITY;
use crate::upload::RetryPolicy;

pub const DEFAULT_ENDPOINT: &str =
    "https://us-east1-fake-profile-detection-460117.cloudfunctions.net/saver";
pub const DEFAULT_TASKS_PAGE: &str = "/web-data-collection-gcs/pages/hosting/tasks.html";

const ENDPOINT_ENV: &str = "KEYSTROKE_UPLOAD_ENDPOINT";
const LOCAL_DEV_ENV: &str = "KEYSTROKE_LOCAL_DEV";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    /// Try the binary-module backend before the typed buffer.
    pub prefer_module: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            prefer_module: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_length: usize,
    pub min_length_debug: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_length: 150,
            min_length_debug: 50,
        }
    }
}

impl ValidationConfig {
    pub fn threshold(&self, debug: bool) -> usize {
        if debug {
            self.min_length_debug
        } else {
            self.min_length
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Skip the network and report a simulated URL.
    pub local_dev: bool,
    pub simulated_delay_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            timeout_ms: 30_000,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            local_dev: false,
            simulated_delay_ms: 1_000,
        }
    }
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub tasks_page_url: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            tasks_page_url: DEFAULT_TASKS_PAGE.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub buffer: BufferConfig,
    pub validation: ValidationConfig,
    pub upload: UploadConfig,
    pub navigation: NavigationConfig,
}

impl CaptureConfig {
    /// Read the config at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config at {}", path.display()))?
        } else {
            log::info!("No config at {}; using defaults", path.display());
            CaptureConfig::default()
        };

        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENDPOINT_ENV).ok(),
            std::env::var(LOCAL_DEV_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, local_dev: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|value| !value.trim().is_empty()) {
            self.upload.endpoint = endpoint;
        }
        if let Some(value) = local_dev {
            self.upload.local_dev = value == "1" || value.eq_ignore_ascii_case("true");
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
