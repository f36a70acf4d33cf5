use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::capture::CaptureEngine;
use crate::models::{DeviceInfo, TaskIdentity};
use crate::store::SubmissionMarkers;
use crate::upload::{UploadClient, UploadError};

use super::artifacts::{ArtifactSet, TaskMetadata};
use super::state::{SubmissionState, SubmissionStatus};
use super::validation::{validate, ValidationError};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("You have already submitted this task.")]
    AlreadySubmitted,
    #[error("A submission is already in progress.")]
    InProgress,
    #[error("Task page is not ready for submission.")]
    NotReady,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Failed to upload files. Please try again. ({0})")]
    Upload(#[from] UploadError),
    #[error("Captured keystrokes are unavailable: {0}")]
    Capture(String),
    #[error("Submission state could not be persisted: {0}")]
    Store(String),
}

impl SubmitError {
    /// Whether the user can fix the problem and submit again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SubmitError::AlreadySubmitted | SubmitError::InProgress | SubmitError::NotReady
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub attempt_id: String,
    pub table_url: String,
    pub raw_text_url: String,
    pub metadata_url: String,
}

/// Gates the one-time completion of a task.
#[derive(Clone)]
pub struct SubmissionCoordinator {
    identity: TaskIdentity,
    state: Arc<Mutex<SubmissionState>>,
    markers: SubmissionMarkers,
    uploader: UploadClient,
    min_length: usize,
    device: DeviceInfo,
}

impl SubmissionCoordinator {
    pub fn new(
        identity: TaskIdentity,
        markers: SubmissionMarkers,
        uploader: UploadClient,
        min_length: usize,
        device: DeviceInfo,
    ) -> Self {
        Self {
            identity,
            state: Arc::new(Mutex::new(SubmissionState::new())),
            markers,
            uploader,
            min_length,
            device,
        }
    }

    pub fn identity(&self) -> &TaskIdentity {
        &self.identity
    }

    pub async fn status(&self) -> SubmissionStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot(&self) -> SubmissionState {
        self.state.lock().await.clone()
    }

    /// Enter `Capturing`, or `Disabled` when the task was already submitted.
    pub async fn initialize(&self) -> Result<SubmissionStatus, SubmitError> {
        let submitted = self.marker_exists().await?;
        let mut state = self.state.lock().await;

        if submitted {
            info!("Task {} already submitted; page disabled", self.describe());
            state.disable();
        } else if state.status == SubmissionStatus::NotStarted {
            state.begin_capture(Utc::now());
            info!("Task {} capturing", self.describe());
        }

        Ok(state.status)
    }

    /// Re-read the permanent marker after the page was hidden or restored.
    /// Returns true when the page is closed for submission.
    pub async fn recheck_marker(&self) -> Result<bool, SubmitError> {
        let submitted = self.marker_exists().await?;
        let mut state = self.state.lock().await;

        if submitted && state.status != SubmissionStatus::Submitted {
            if state.status != SubmissionStatus::Disabled {
                warn!("Task {} was submitted elsewhere; disabling page", self.describe());
            }
            state.disable();
        }

        Ok(state.status.is_closed())
    }

    pub async fn submit(&self, text: &str, engine: &CaptureEngine) -> Result<SubmissionReceipt, SubmitError> {
        let attempt_id = self.enter_validation().await?;

        let event_count = match engine.count().await {
            Ok(count) => count,
            Err(err) => return Err(self.fail(SubmitError::Capture(format!("{err:#}"))).await),
        };

        if let Err(err) = validate(text, self.min_length, event_count) {
            info!("Submission {attempt_id} rejected: {err}");
            self.state.lock().await.reject(err.to_string());
            return Err(err.into());
        }

        let table = match engine.export_table().await {
            Ok(table) => table,
            Err(err) => return Err(self.fail(SubmitError::Capture(format!("{err:#}"))).await),
        };

        let started_at = {
            let mut state = self.state.lock().await;
            state.begin_upload();
            state.started_at.unwrap_or_else(Utc::now)
        };

        let metadata = TaskMetadata::new(&self.identity, &self.device, started_at, Utc::now());
        let artifacts = match ArtifactSet::build(&self.identity, table, text, &metadata) {
            Ok(artifacts) => artifacts,
            Err(err) => return Err(self.fail(SubmitError::Capture(format!("{err:#}"))).await),
        };

        info!(
            "Submission {attempt_id}: uploading {} events for task {}",
            event_count,
            self.describe()
        );

        let (table_url, raw_text_url, metadata_url) = tokio::join!(
            self.uploader.upload(&artifacts.table),
            self.uploader.upload(&artifacts.raw_text),
            self.uploader.upload(&artifacts.metadata),
        );

        let uploaded: Result<(String, String, String), UploadError> =
            (|| Ok((table_url?, raw_text_url?, metadata_url?)))();
        let (table_url, raw_text_url, metadata_url) = match uploaded {
            Ok(urls) => urls,
            Err(err) => return Err(self.fail(SubmitError::Upload(err)).await),
        };

        if let Err(err) = self.markers.mark_submitted(&self.identity).await {
            return Err(self.fail(SubmitError::Store(format!("{err:#}"))).await);
        }

        self.state.lock().await.complete(Utc::now());
        info!("Submission {attempt_id} complete for task {}", self.describe());

        Ok(SubmissionReceipt {
            attempt_id,
            table_url,
            raw_text_url,
            metadata_url,
        })
    }

    async fn enter_validation(&self) -> Result<String, SubmitError> {
        {
            let state = self.state.lock().await;
            match state.status {
                SubmissionStatus::Validating | SubmissionStatus::Uploading => {
                    return Err(SubmitError::InProgress)
                }
                SubmissionStatus::Submitted | SubmissionStatus::Disabled => {
                    return Err(SubmitError::AlreadySubmitted)
                }
                SubmissionStatus::NotStarted => return Err(SubmitError::NotReady),
                SubmissionStatus::Capturing | SubmissionStatus::Failed => {}
            }
        }

        let submitted = self.marker_exists().await?;
        let mut state = self.state.lock().await;

        if submitted {
            warn!("Duplicate submission for task {} rejected", self.describe());
            state.disable();
            return Err(SubmitError::AlreadySubmitted);
        }
        if !state.status.accepts_submit() {
            return Err(SubmitError::InProgress);
        }

        let attempt_id = Uuid::new_v4().to_string();
        state.begin_validation(attempt_id.clone());
        Ok(attempt_id)
    }

    async fn fail(&self, err: SubmitError) -> SubmitError {
        warn!("Submission for task {} failed: {err}", self.describe());
        self.state.lock().await.fail(err.to_string());
        err
    }

    async fn marker_exists(&self) -> Result<bool, SubmitError> {
        self.markers
            .is_submitted(&self.identity)
            .await
            .map_err(|err| SubmitError::Store(format!("{err:#}")))
    }

    fn describe(&self) -> String {
        format!(
            "{}/{}/{}",
            self.identity.user_id, self.identity.task_id, self.identity.platform_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ManualClock;
    use crate::config::BufferConfig;
    use crate::models::KeySignal;
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::upload::tests::ScriptedTransport;
    use crate::upload::{
        Artifact, AttemptError, RetryPolicy, UploadResponse, UploadTransport,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    /// Stores everything except one filename, which always fails.
    struct RejectingTransport {
        rejected: String,
        inner: ScriptedTransport,
    }

    #[async_trait]
    impl UploadTransport for RejectingTransport {
        async fn send(&self, artifact: &Artifact) -> Result<UploadResponse, AttemptError> {
            if artifact.filename == self.rejected {
                self.inner.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                return Err(AttemptError::Status {
                    status: 500,
                    message: "Internal Server Error".into(),
                });
            }
            self.inner.send(artifact).await
        }
    }

    fn identity() -> TaskIdentity {
        TaskIdentity::new("u1", "3", "0")
    }

    fn coordinator(
        store: Arc<MemoryStore>,
        transport: Arc<dyn UploadTransport>,
        min_length: usize,
    ) -> SubmissionCoordinator {
        let uploader = UploadClient::new(transport, RetryPolicy::default(), Duration::from_secs(30));
        SubmissionCoordinator::new(
            identity(),
            SubmissionMarkers::new(store),
            uploader,
            min_length,
            DeviceInfo::default(),
        )
    }

    fn typed_engine() -> (CaptureEngine, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000.0);
        let config = BufferConfig {
            capacity: 1_000,
            prefer_module: false,
        };
        let mut engine = CaptureEngine::new(config, Arc::new(clock.clone()), None);
        engine.activate();
        (engine, clock)
    }

    fn type_text(engine: &mut CaptureEngine, clock: &ManualClock, text: &str) {
        for ch in text.chars() {
            let key = ch.to_string();
            let code = format!("Key{}", ch.to_ascii_uppercase());
            clock.advance(20.0);
            engine.key_down(&KeySignal::new(code.as_str(), key.as_str()));
            clock.advance(20.0);
            engine.key_up(&KeySignal::new(code.as_str(), key.as_str()));
        }
    }

    #[tokio::test]
    async fn existing_marker_rejects_without_network() {
        let store = Arc::new(MemoryStore::new());
        store.set("submitted_u1_3_0", "true").await.unwrap();
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let coordinator = coordinator(store, transport.clone(), 5);

        assert_eq!(coordinator.initialize().await.unwrap(), SubmissionStatus::Disabled);

        let (mut engine, clock) = typed_engine();
        type_text(&mut engine, &clock, "hello world");
        let err = coordinator.submit("hello world", &engine).await.unwrap_err();

        assert!(matches!(err, SubmitError::AlreadySubmitted));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn marker_written_elsewhere_is_detected_at_submit() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let coordinator = coordinator(store.clone(), transport.clone(), 5);
        coordinator.initialize().await.unwrap();

        store.set("submitted_u1_3_0", "true").await.unwrap();
        let (mut engine, clock) = typed_engine();
        type_text(&mut engine, &clock, "hello");

        let err = coordinator.submit("hello", &engine).await.unwrap_err();
        assert!(matches!(err, SubmitError::AlreadySubmitted));
        assert_eq!(coordinator.status().await, SubmissionStatus::Disabled);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn short_text_returns_to_capturing() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let coordinator = coordinator(store, transport.clone(), 150);
        coordinator.initialize().await.unwrap();

        let text = "a".repeat(40);
        let (mut engine, clock) = typed_engine();
        type_text(&mut engine, &clock, &text);

        let err = coordinator.submit(&text, &engine).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Posts shorter than 150 characters are not allowed! Current length: 40"
        );
        let state = coordinator.snapshot().await;
        assert_eq!(state.status, SubmissionStatus::Capturing);
        assert_eq!(state.last_error.as_deref(), Some(err.to_string().as_str()));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn empty_capture_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let coordinator = coordinator(store, transport, 5);
        coordinator.initialize().await.unwrap();

        let (engine, _clock) = typed_engine();
        let err = coordinator.submit("typed elsewhere", &engine).await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ValidationError::NoKeystrokes)));
    }

    #[tokio::test]
    async fn successful_submit_writes_marker() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let coordinator = coordinator(store.clone(), transport.clone(), 5);
        coordinator.initialize().await.unwrap();

        let (mut engine, clock) = typed_engine();
        type_text(&mut engine, &clock, "hello");

        let receipt = coordinator.submit("hello", &engine).await.unwrap();
        assert_eq!(receipt.table_url, "https://storage.test/f_u1_3.csv");
        assert_eq!(receipt.raw_text_url, "https://storage.test/f_u1_3_raw.txt");
        assert_eq!(receipt.metadata_url, "https://storage.test/f_u1_3_metadata.json");
        assert_eq!(transport.calls(), 3);
        assert!(store.has("submitted_u1_3_0").await.unwrap());
        assert_eq!(coordinator.status().await, SubmissionStatus::Submitted);

        let again = coordinator.submit("hello", &engine).await.unwrap_err();
        assert!(matches!(again, SubmitError::AlreadySubmitted));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failed_artifact_fails_submission_without_marker() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RejectingTransport {
            rejected: "f_u1_3_metadata.json".into(),
            inner: ScriptedTransport::new(Vec::new()),
        });
        let coordinator = coordinator(store.clone(), transport.clone(), 5);
        coordinator.initialize().await.unwrap();

        let (mut engine, clock) = typed_engine();
        type_text(&mut engine, &clock, "hello");

        let err = coordinator.submit("hello", &engine).await.unwrap_err();
        assert!(matches!(err, SubmitError::Upload(_)));
        assert!(err.is_retryable());
        assert_eq!(coordinator.status().await, SubmissionStatus::Failed);
        assert!(!store.has("submitted_u1_3_0").await.unwrap());
        // Two artifacts once each, the rejected one three times.
        assert_eq!(transport.inner.calls(), 5);
    }

    #[tokio::test]
    async fn recheck_disables_resumed_page() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let coordinator = coordinator(store.clone(), transport, 5);
        coordinator.initialize().await.unwrap();
        assert!(!coordinator.recheck_marker().await.unwrap());

        store.set("submitted_u1_3_0", "true").await.unwrap();
        assert!(coordinator.recheck_marker().await.unwrap());
        assert_eq!(coordinator.status().await, SubmissionStatus::Disabled);
    }

    #[tokio::test]
    async fn submit_before_initialize_is_not_ready() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let coordinator = coordinator(store, transport, 5);
        let (engine, _clock) = typed_engine();

        let err = coordinator.submit("hello", &engine).await.unwrap_err();
        assert!(matches!(err, SubmitError::NotReady));
    }
}
