use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionStatus {
    #[default]
    NotStarted,
    Capturing,
    Validating,
    Uploading,
    Submitted,
    /// Upload failed; the submit action is available again.
    Failed,
    /// Already submitted when the page was opened or restored.
    Disabled,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::NotStarted => "NotStarted",
            SubmissionStatus::Capturing => "Capturing",
            SubmissionStatus::Validating => "Validating",
            SubmissionStatus::Uploading => "Uploading",
            SubmissionStatus::Submitted => "Submitted",
            SubmissionStatus::Failed => "Failed",
            SubmissionStatus::Disabled => "Disabled",
        }
    }

    /// Terminal for this page: no further submit is possible.
    pub fn is_closed(&self) -> bool {
        matches!(self, SubmissionStatus::Submitted | SubmissionStatus::Disabled)
    }

    pub fn accepts_submit(&self) -> bool {
        matches!(self, SubmissionStatus::Capturing | SubmissionStatus::Failed)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionState {
    pub status: SubmissionStatus,
    pub attempt_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// User-facing reason for the last validation or upload failure.
    pub last_error: Option<String>,
    pub attempts: u32,
}

impl SubmissionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_capture(&mut self, now: DateTime<Utc>) {
        self.status = SubmissionStatus::Capturing;
        self.started_at = Some(now);
        self.last_error = None;
    }

    pub fn disable(&mut self) {
        self.status = SubmissionStatus::Disabled;
    }

    pub fn begin_validation(&mut self, attempt_id: String) {
        self.status = SubmissionStatus::Validating;
        self.attempt_id = Some(attempt_id);
        self.attempts += 1;
        self.last_error = None;
    }

    pub fn reject(&mut self, reason: String) {
        self.status = SubmissionStatus::Capturing;
        self.last_error = Some(reason);
    }

    pub fn begin_upload(&mut self) {
        self.status = SubmissionStatus::Uploading;
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = SubmissionStatus::Submitted;
        self.completed_at = Some(now);
        self.last_error = None;
    }

    pub fn fail(&mut self, reason: String) {
        self.status = SubmissionStatus::Failed;
        self.last_error = Some(reason);
    }
}
