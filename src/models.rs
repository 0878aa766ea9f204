//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains the request/response structures used by the task endpoints.

use crate::report::{TASK_DESCRIPTION, TASK_SLUG, TASK_TITLE};
use serde::{Deserialize, Serialize};

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Query string of the change report task. `daysBack` stays a raw string so
/// that junk input falls back to the default instead of a 400.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    #[serde(default)]
    pub days_back: Option<String>,
}

/// A task the runner can invoke
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub path: String,
}

impl TaskInfo {
    pub fn changed_data_objects() -> Self {
        Self {
            slug: TASK_SLUG,
            title: TASK_TITLE,
            description: TASK_DESCRIPTION,
            path: format!("/dev/tasks/{}", TASK_SLUG),
        }
    }
}
