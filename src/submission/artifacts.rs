use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{DeviceInfo, DeviceType, TaskIdentity};
use crate::upload::Artifact;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskMetadata {
    pub user_id: String,
    pub platform_id: String,
    pub task_id: String,
    /// Epoch milliseconds.
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: i64,
    pub platform: String,
    pub is_mobile: bool,
    pub device_type: DeviceType,
    pub user_agent: String,
    pub screen_size: String,
}

impl TaskMetadata {
    pub fn new(
        identity: &TaskIdentity,
        device: &DeviceInfo,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        let start_time = started_at.timestamp_millis();
        let end_time = ended_at.timestamp_millis();
        Self {
            user_id: identity.user_id.clone(),
            platform_id: identity.platform_id.clone(),
            task_id: identity.task_id.clone(),
            start_time,
            end_time,
            duration_ms: end_time - start_time,
            platform: identity.platform_name().to_string(),
            is_mobile: device.is_mobile(),
            device_type: device.device_type(),
            user_agent: device.user_agent.clone(),
            screen_size: device.screen_size(),
        }
    }
}

/// The three files uploaded for one submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSet {
    pub table: Artifact,
    pub raw_text: Artifact,
    pub metadata: Artifact,
}

impl ArtifactSet {
    pub fn build(identity: &TaskIdentity, table: String, text: &str, metadata: &TaskMetadata) -> Result<Self> {
        let metadata_json =
            serde_json::to_string_pretty(metadata).context("failed to serialize task metadata")?;

        Ok(Self {
            table: Artifact::new(identity.table_file_name(), CSV_CONTENT_TYPE, table),
            raw_text: Artifact::new(identity.raw_text_file_name(), TEXT_CONTENT_TYPE, text.trim()),
            metadata: Artifact::new(identity.metadata_file_name(), JSON_CONTENT_TYPE, metadata_json),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn iphone() -> DeviceInfo {
        DeviceInfo {
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".into(),
            screen_width: 390,
            screen_height: 844,
            window_width: 390,
            window_height: 700,
            touch_capable: true,
            has_orientation: true,
        }
    }

    #[test]
    fn metadata_document_shape() {
        let identity = TaskIdentity::new("u1", "3", "1");
        let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let end = Utc.timestamp_millis_opt(1_700_000_090_500).unwrap();
        let metadata = TaskMetadata::new(&identity, &iphone(), start, end);

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "user_id": "u1",
                "platform_id": "1",
                "task_id": "3",
                "start_time": 1_700_000_000_000i64,
                "end_time": 1_700_000_090_500i64,
                "duration_ms": 90_500,
                "platform": "instagram",
                "is_mobile": true,
                "device_type": "mobile",
                "user_agent": "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)",
                "screen_size": "390x844"
            })
        );
    }

    #[test]
    fn artifact_names_and_types() {
        let identity = TaskIdentity::new("u1", "3", "0");
        let now = Utc::now();
        let metadata = TaskMetadata::new(&identity, &DeviceInfo::default(), now, now);
        let set = ArtifactSet::build(&identity, "Press or Release,Key,Time".into(), "  hi  \n", &metadata)
            .unwrap();

        assert_eq!(set.table.filename, "f_u1_3.csv");
        assert_eq!(set.table.content_type, "text/csv");
        assert_eq!(set.raw_text.filename, "f_u1_3_raw.txt");
        assert_eq!(set.raw_text.bytes, b"hi".to_vec());
        assert_eq!(set.metadata.filename, "f_u1_3_metadata.json");
        assert_eq!(set.metadata.content_type, "application/json");

        let body = String::from_utf8(set.metadata.bytes).unwrap();
        assert!(body.starts_with("{\n  \"user_id\": \"u1\""));
    }
}
