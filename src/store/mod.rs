//! Persisted key-value state shared across loads of the same task page.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::TaskIdentity;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// `submitted_{user}_{task}_{platform}`
pub fn submission_key(identity: &TaskIdentity) -> String {
    format!(
        "submitted_{}_{}_{}",
        identity.user_id, identity.task_id, identity.platform_id
    )
}

/// `initialized_{platform}_{task}`
pub fn init_guard_key(identity: &TaskIdentity) -> String {
    format!("initialized_{}_{}", identity.platform_name(), identity.task_id)
}

/// `draft_{platform}_{task}`
pub fn draft_key(identity: &TaskIdentity) -> String {
    format!("draft_{}_{}", identity.platform_name(), identity.task_id)
}

/// Write-once completion markers; nothing clears them.
#[derive(Clone)]
pub struct SubmissionMarkers {
    store: Arc<dyn KeyValueStore>,
}

impl SubmissionMarkers {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn is_submitted(&self, identity: &TaskIdentity) -> Result<bool> {
        self.store.has(&submission_key(identity)).await
    }

    /// Returns false when the marker already existed.
    pub async fn mark_submitted(&self, identity: &TaskIdentity) -> Result<bool> {
        let key = submission_key(identity);
        if self.store.has(&key).await? {
            return Ok(false);
        }
        self.store.set(&key, "true").await?;
        Ok(true)
    }
}
