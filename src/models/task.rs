use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing user or platform or task info in URL (missing: {})", .0.join(", "))]
    MissingIdentifiers(Vec<&'static str>),
}

/// The three simulated platforms a task can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    Facebook,
    Instagram,
    Twitter,
}

impl Platform {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "0" => Some(Platform::Facebook),
            "1" => Some(Platform::Instagram),
            "2" => Some(Platform::Twitter),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Platform::Facebook => "0",
            Platform::Instagram => "1",
            Platform::Twitter => "2",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            Platform::Facebook => "f",
            Platform::Instagram => "i",
            Platform::Twitter => "t",
        }
    }
}

/// Query parameters a task page is opened with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskParams {
    pub user_id: Option<String>,
    pub platform_id: Option<String>,
    pub task_id: Option<String>,
    pub return_url: Option<String>,
    pub debug: bool,
}

impl TaskParams {
    /// Parse a query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = TaskParams::default();

        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            match name.as_ref() {
                "user_id" => params.user_id = non_empty(value),
                "platform_id" => params.platform_id = non_empty(value),
                "task_id" => params.task_id = non_empty(value),
                "return_url" => params.return_url = non_empty(value),
                "debug" => params.debug = value == "true",
                _ => {}
            }
        }

        params
    }

    /// Require user, task and platform identifiers.
    pub fn identity(&self) -> Result<TaskIdentity, ConfigError> {
        let mut missing = Vec::new();
        if self.user_id.is_none() {
            missing.push("user_id");
        }
        if self.platform_id.is_none() {
            missing.push("platform_id");
        }
        if self.task_id.is_none() {
            missing.push("task_id");
        }

        match (&self.user_id, &self.task_id, &self.platform_id) {
            (Some(user_id), Some(task_id), Some(platform_id)) => Ok(TaskIdentity {
                user_id: user_id.clone(),
                task_id: task_id.clone(),
                platform_id: platform_id.clone(),
            }),
            _ => Err(ConfigError::MissingIdentifiers(missing)),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The (user, task, platform) triple one submission belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskIdentity {
    pub user_id: String,
    pub task_id: String,
    pub platform_id: String,
}

impl TaskIdentity {
    pub fn new(
        user_id: impl Into<String>,
        task_id: impl Into<String>,
        platform_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            task_id: task_id.into(),
            platform_id: platform_id.into(),
        }
    }

    pub fn platform(&self) -> Option<Platform> {
        Platform::from_id(&self.platform_id)
    }

    /// `f`, `i` or `t`; `u` for an unrecognised platform id.
    pub fn file_prefix(&self) -> &'static str {
        self.platform().map(|p| p.file_prefix()).unwrap_or("u")
    }

    pub fn platform_name(&self) -> &'static str {
        self.platform().map(|p| p.name()).unwrap_or("unknown")
    }

    fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.file_prefix(), self.user_id, self.task_id)
    }

    pub fn table_file_name(&self) -> String {
        format!("{}.csv", self.file_stem())
    }

    pub fn raw_text_file_name(&self) -> String {
        format!("{}_raw.txt", self.file_stem())
    }

    pub fn metadata_file_name(&self) -> String {
        format!("{}_metadata.json", self.file_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_query() {
        let params = TaskParams::from_query(
            "?user_id=u1&platform_id=0&task_id=3&return_url=%2Ftasks.html%3Fuser_id%3Du1",
        );
        assert_eq!(params.user_id.as_deref(), Some("u1"));
        assert_eq!(params.platform_id.as_deref(), Some("0"));
        assert_eq!(params.task_id.as_deref(), Some("3"));
        assert_eq!(params.return_url.as_deref(), Some("/tasks.html?user_id=u1"));
        assert!(!params.debug);
    }

    #[test]
    fn debug_requires_explicit_opt_in() {
        assert!(TaskParams::from_query("debug=true").debug);
        assert!(!TaskParams::from_query("debug=1").debug);
        assert!(!TaskParams::from_query("").debug);
    }

    #[test]
    fn missing_identifiers_are_reported() {
        let params = TaskParams::from_query("user_id=u1&task_id=");
        assert_eq!(
            params.identity(),
            Err(ConfigError::MissingIdentifiers(vec!["platform_id", "task_id"]))
        );
    }

    #[test]
    fn file_names_follow_platform_prefix() {
        let identity = TaskIdentity::new("u1", "3", "2");
        assert_eq!(identity.table_file_name(), "t_u1_3.csv");
        assert_eq!(identity.raw_text_file_name(), "t_u1_3_raw.txt");
        assert_eq!(identity.metadata_file_name(), "t_u1_3_metadata.json");

        let unknown = TaskIdentity::new("u1", "3", "9");
        assert_eq!(unknown.table_file_name(), "u_u1_3.csv");
    }
}
