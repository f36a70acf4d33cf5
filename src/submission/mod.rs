mod artifacts;
mod coordinator;
mod state;
mod validation;

pub use artifacts::{ArtifactSet, TaskMetadata, CSV_CONTENT_TYPE, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
pub use coordinator::{SubmissionCoordinator, SubmissionReceipt, SubmitError};
pub use state::{SubmissionState, SubmissionStatus};
pub use validation::{validate, ValidationError};
