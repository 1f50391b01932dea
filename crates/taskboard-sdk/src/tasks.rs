//! Wire types for the task-board REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A task as returned by the board.
///
/// Only the fields the reconciliation flow reads are modeled; the API
/// returns many more, which deserialization ignores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<TaskTag>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Task {
    /// Whether the task already carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.name == tag)
    }
}

/// A tag attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTag {
    pub name: String,
}

/// One page of a list's tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A custom-field value to set on task creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub id: String,
    pub value: Value,
}

impl CustomFieldValue {
    pub fn new(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// Request body for task creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
}

/// A custom-field predicate for the task-search query string.
///
/// The API expects these serialized as a JSON array in the `custom_fields`
/// query parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldFilter {
    pub field_id: String,
    pub operator: String,
    pub value: String,
}

impl CustomFieldFilter {
    /// Equality predicate on one custom field.
    pub fn equals(field_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            operator: "=".to_string(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
