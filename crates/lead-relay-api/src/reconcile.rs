//! Reconciliation of normalized records against the task board.
//!
//! One task per lead, keyed by the email custom field: a hit appends the
//! derived tag to the existing task, a miss creates a task carrying the
//! tag and whatever custom-field values the delivery produced.

use std::sync::Arc;

use async_trait::async_trait;
use lead_relay_core::CanonicalRecord;
use serde::Serialize;
use serde_json::Value;
use taskboard_sdk::{ApiError, CreateTaskRequest, CustomFieldValue, Task, TaskBoardClient};
use tracing::{info, instrument};

use crate::config::TaskboardConfig;

/// Interface to the task store, seam for testing the reconciliation flow
/// without a live board.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Find the open lead task for an email address, if any.
    async fn find_task_by_email(&self, token: &str, email: &str)
        -> Result<Option<Task>, ApiError>;

    /// Create a lead task.
    async fn create_task(&self, token: &str, request: &CreateTaskRequest)
        -> Result<Task, ApiError>;

    /// Append a tag to an existing task.
    async fn add_tag(&self, token: &str, task_id: &str, tag: &str) -> Result<(), ApiError>;
}

/// [`TaskStore`] backed by the task-board API client.
pub struct SdkTaskStore {
    client: TaskBoardClient,
    list_id: String,
    email_field_id: String,
}

impl SdkTaskStore {
    pub fn new(client: TaskBoardClient, config: &TaskboardConfig) -> Self {
        Self {
            client,
            list_id: config.list_id.clone(),
            email_field_id: config.email_field_id.clone(),
        }
    }
}

#[async_trait]
impl TaskStore for SdkTaskStore {
    async fn find_task_by_email(
        &self,
        token: &str,
        email: &str,
    ) -> Result<Option<Task>, ApiError> {
        self.client
            .find_task_by_custom_field(token, &self.list_id, &self.email_field_id, email)
            .await
    }

    async fn create_task(
        &self,
        token: &str,
        request: &CreateTaskRequest,
    ) -> Result<Task, ApiError> {
        self.client.create_task(token, &self.list_id, request).await
    }

    async fn add_tag(&self, token: &str, task_id: &str, tag: &str) -> Result<(), ApiError> {
        self.client.add_tag(token, task_id, tag).await
    }
}

/// Event-specific values that accompany the canonical record into the
/// task's custom fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskExtras {
    pub document: Option<String>,
    pub payment_method: Option<String>,
    pub payment_brand: Option<String>,
    pub coupon: Option<String>,
}

/// Result of reconciling one delivery against the board.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The lead already had a task; the tag was appended to it.
    Tagged { task_id: String, tag: String },
    /// No task existed for the lead; one was created.
    Created { task: Task, tag: String },
}

/// Reconciliation failures.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The record lacks the fields needed to identify or create a task.
    #[error("missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// No tag could be derived, so there is nothing to reconcile.
    #[error("could not determine a task tag for this payload")]
    MissingTag,

    /// The task-board API rejected or failed an operation.
    #[error("task store operation failed: {0}")]
    Upstream(#[from] ApiError),
}

/// Orchestrates lookup, tagging and creation against a [`TaskStore`].
pub struct Reconciler {
    store: Arc<dyn TaskStore>,
    config: TaskboardConfig,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TaskStore>, config: TaskboardConfig) -> Self {
        Self { store, config }
    }

    /// Reconcile one normalized record: look the lead up by email, then
    /// either append the tag to the existing task or create a new one.
    ///
    /// No retries here: transient upstream failures surface to the caller,
    /// and the checkout platform redelivers the webhook.
    #[instrument(skip(self, token, record, extras), fields(email, tag))]
    pub async fn reconcile(
        &self,
        token: &str,
        record: &CanonicalRecord,
        extras: &TaskExtras,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let missing = record.missing_required();
        if !missing.is_empty() {
            return Err(ReconcileError::MissingFields { fields: missing });
        }

        // missing_required() guarantees both are present.
        let (Some(email), Some(name)) = (record.email.as_deref(), record.name.as_deref()) else {
            return Err(ReconcileError::MissingFields {
                fields: vec!["nome".to_string(), "email".to_string()],
            });
        };
        let tag = record.tag.as_deref().ok_or(ReconcileError::MissingTag)?;

        tracing::Span::current().record("email", email);
        tracing::Span::current().record("tag", tag);

        if let Some(task) = self.store.find_task_by_email(token, email).await? {
            self.store.add_tag(token, &task.id, tag).await?;
            info!(task_id = %task.id, "tagged existing lead task");
            return Ok(ReconcileOutcome::Tagged {
                task_id: task.id,
                tag: tag.to_string(),
            });
        }

        let request = self.build_create_request(name, tag, record, extras);
        let task = self.store.create_task(token, &request).await?;
        info!(task_id = %task.id, "created lead task");
        Ok(ReconcileOutcome::Created {
            task,
            tag: tag.to_string(),
        })
    }

    /// Assemble the creation request. Custom fields are written only when
    /// both the board field ID is configured and the delivery produced a
    /// value; absent pairs are omitted rather than sent as null.
    fn build_create_request(
        &self,
        name: &str,
        tag: &str,
        record: &CanonicalRecord,
        extras: &TaskExtras,
    ) -> CreateTaskRequest {
        let mut custom_fields = vec![CustomFieldValue::new(
            self.config.email_field_id.clone(),
            record.email.clone().unwrap_or_default(),
        )];

        let optional: [(&Option<String>, Option<Value>); 6] = [
            (
                &self.config.phone_field_id,
                record.phone.clone().map(Value::from),
            ),
            (&self.config.amount_field_id, record.amount.map(Value::from)),
            (
                &self.config.document_field_id,
                extras.document.clone().map(Value::from),
            ),
            (
                &self.config.payment_method_field_id,
                extras.payment_method.clone().map(Value::from),
            ),
            (
                &self.config.payment_brand_field_id,
                extras.payment_brand.clone().map(Value::from),
            ),
            (
                &self.config.coupon_field_id,
                extras.coupon.clone().map(Value::from),
            ),
        ];

        for (field_id, value) in optional {
            if let (Some(field_id), Some(value)) = (field_id, value) {
                custom_fields.push(CustomFieldValue::new(field_id.clone(), value));
            }
        }

        CreateTaskRequest {
            name: self.config.task_name_template.replace("{name}", name),
            tags: vec![tag.to_string()],
            custom_fields,
        }
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
