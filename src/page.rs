//! Per-task page context: owns the capture engine, submission coordinator and
//! text field for one (user, task, platform) page load.

use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};

use crate::buffer::ModuleLoader;
use crate::capture::{CaptureEngine, Clock, KeyDisposition, TextField};
use crate::config::CaptureConfig;
use crate::models::{DeviceInfo, KeySignal, SignalTarget, TaskIdentity, TaskParams};
use crate::store::{draft_key, init_guard_key, KeyValueStore, SubmissionMarkers};
use crate::submission::{SubmissionCoordinator, SubmissionReceipt, SubmissionStatus, SubmitError};
use crate::upload::UploadClient;

pub const ALREADY_SUBMITTED_TEXT: &str = "You have already submitted this task.";
pub const ALREADY_SUBMITTED_LABEL: &str = "Already Submitted";
pub const PASTE_WARNING: &str = "Paste Disabled: Please type your response.";

const SUBMIT_LABEL: &str = "Post";
const SUBMITTING_LABEL: &str = "Posting...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteOutcome {
    Blocked,
}

impl PasteOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            PasteOutcome::Blocked => PASTE_WARNING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitButton {
    pub label: String,
    pub enabled: bool,
}

impl Default for SubmitButton {
    fn default() -> Self {
        Self {
            label: SUBMIT_LABEL.into(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSuccess {
    pub receipt: SubmissionReceipt,
    /// Where the page navigates next.
    pub navigate_to: String,
}

/// Collaborators a task page is built from.
pub struct PageServices {
    pub store: Arc<dyn KeyValueStore>,
    pub uploader: UploadClient,
    pub clock: Arc<dyn Clock>,
    pub loader: Option<Arc<dyn ModuleLoader>>,
    pub device: DeviceInfo,
}

pub struct TaskPage {
    identity: TaskIdentity,
    params: TaskParams,
    config: CaptureConfig,
    store: Arc<dyn KeyValueStore>,
    engine: CaptureEngine,
    coordinator: SubmissionCoordinator,
    field: TextField,
    button: SubmitButton,
    started: bool,
}

impl TaskPage {
    /// Open the page for the task named in `params`. Missing identifiers fail
    /// with [`crate::models::ConfigError`].
    pub async fn open(params: TaskParams, config: CaptureConfig, services: PageServices) -> Result<Self> {
        let identity = params.identity()?;
        let min_length = config.validation.threshold(params.debug);
        if params.debug {
            info!("Debug mode: minimum length {min_length}");
        }

        let coordinator = SubmissionCoordinator::new(
            identity.clone(),
            SubmissionMarkers::new(Arc::clone(&services.store)),
            services.uploader,
            min_length,
            services.device,
        );
        let engine = CaptureEngine::new(config.buffer.clone(), services.clock, services.loader);

        let mut page = Self {
            identity,
            params,
            config,
            store: services.store,
            engine,
            coordinator,
            field: TextField::new(),
            button: SubmitButton::default(),
            started: false,
        };
        page.start().await?;
        Ok(page)
    }

    /// Begin capture for this page load. Returns false when already started or
    /// when the task was submitted before.
    pub async fn start(&mut self) -> Result<bool> {
        if self.started {
            info!("Task page already initialized for task {}", self.identity.task_id);
            return Ok(false);
        }

        let status = self.coordinator.initialize().await?;
        if status == SubmissionStatus::Disabled {
            self.disable_form();
            return Ok(false);
        }

        let guard = init_guard_key(&self.identity);
        if self.store.has(&guard).await? {
            info!("Resuming task {} in this session", self.identity.task_id);
        }
        self.store.set(&guard, "true").await?;

        let backend = self.engine.activate();
        info!(
            "{} page loaded for task {} ({} backend)",
            self.identity.platform_name(),
            self.identity.task_id,
            backend.as_str()
        );

        if let Some(draft) = self.store.get(&draft_key(&self.identity)).await? {
            info!("Restored draft of {} chars", draft.chars().count());
            self.field.set_value(draft);
        }

        self.started = true;
        Ok(true)
    }

    pub fn identity(&self) -> &TaskIdentity {
        &self.identity
    }

    pub fn engine(&self) -> &CaptureEngine {
        &self.engine
    }

    pub fn coordinator(&self) -> &SubmissionCoordinator {
        &self.coordinator
    }

    pub fn field(&self) -> &TextField {
        &self.field
    }

    pub fn button(&self) -> &SubmitButton {
        &self.button
    }

    pub fn key_down(&mut self, signal: &KeySignal) -> KeyDisposition {
        if self.field.is_disabled() {
            return KeyDisposition::Default;
        }

        let disposition = self.engine.key_down(signal);
        if disposition == KeyDisposition::InsertNewline && signal.target == SignalTarget::TextField {
            self.field.insert_at_caret("\n");
        }
        disposition
    }

    pub fn key_up(&mut self, signal: &KeySignal) {
        if !self.field.is_disabled() {
            self.engine.key_up(signal);
        }
    }

    /// Input event: the field's value changed.
    pub fn set_text(&mut self, text: &str) {
        if !self.field.is_disabled() {
            self.field.set_value(text);
        }
    }

    pub fn paste(&self) -> PasteOutcome {
        warn!("Paste attempt blocked at {}", chrono::Utc::now().to_rfc3339());
        PasteOutcome::Blocked
    }

    pub async fn submit(&mut self) -> Result<SubmitSuccess, SubmitError> {
        if !self.button.enabled {
            return Err(if self.coordinator.status().await.is_closed() {
                SubmitError::AlreadySubmitted
            } else {
                SubmitError::InProgress
            });
        }

        self.button.enabled = false;
        self.button.label = SUBMITTING_LABEL.into();

        let text = self.field.value().to_string();
        match self.coordinator.submit(&text, &self.engine).await {
            Ok(receipt) => {
                self.engine.finalize();
                if let Err(err) = self.store.remove(&draft_key(&self.identity)).await {
                    error!("Failed to clear draft: {err:#}");
                }
                self.button.label = ALREADY_SUBMITTED_LABEL.into();
                let navigate_to = self.return_target();
                info!("Post submitted; returning to {navigate_to}");
                Ok(SubmitSuccess {
                    receipt,
                    navigate_to,
                })
            }
            Err(SubmitError::AlreadySubmitted) => {
                self.disable_form();
                Err(SubmitError::AlreadySubmitted)
            }
            Err(err) => {
                self.button = SubmitButton::default();
                Err(err)
            }
        }
    }

    /// `return_url` when given, otherwise the tasks page with the completed task.
    pub fn return_target(&self) -> String {
        match &self.params.return_url {
            Some(url) => url.clone(),
            None => format!(
                "{}?user_id={}&completed_task={}",
                self.config.navigation.tasks_page_url, self.identity.user_id, self.identity.task_id
            ),
        }
    }

    pub async fn on_visibility_change(&mut self, visible: bool) -> Result<()> {
        if visible {
            self.recheck().await?;
        }
        Ok(())
    }

    /// Page shown again; `persisted` is set for back/forward cache restores.
    pub async fn on_page_show(&mut self, persisted: bool) -> Result<()> {
        if persisted {
            info!("Page restored from cache");
            self.recheck().await?;
        }
        Ok(())
    }

    async fn recheck(&mut self) -> Result<()> {
        let status = self.coordinator.status().await;
        if status == SubmissionStatus::Submitted {
            return Ok(());
        }
        if self.coordinator.recheck_marker().await? {
            self.engine.finalize();
            self.disable_form();
        }
        Ok(())
    }

    /// Page is going away. Keeps a draft and drops the init guard unless the
    /// task was submitted.
    pub async fn unload(&mut self) -> Result<()> {
        let status = self.coordinator.status().await;
        if !status.is_closed() {
            let draft = draft_key(&self.identity);
            if self.field.value().trim().is_empty() {
                self.store.remove(&draft).await?;
            } else {
                self.store.set(&draft, self.field.value()).await?;
            }
            self.store.remove(&init_guard_key(&self.identity)).await?;
        }

        self.engine.clear().await?;
        self.started = false;
        Ok(())
    }

    fn disable_form(&mut self) {
        self.field.disable_with(ALREADY_SUBMITTED_TEXT);
        self.button.enabled = false;
        self.button.label = ALREADY_SUBMITTED_LABEL.into();
    }
}
