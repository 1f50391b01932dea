//! # TaskBoard SDK
//!
//! Client library for the external task-board API used to track leads.
//!
//! The board stores one task per lead, keyed by an email custom field.
//! This SDK covers the three operations the reconciliation flow needs:
//! - look up open tasks in a list by a custom-field filter,
//! - create a task with tags and custom-field values,
//! - append a tag to an existing task.
//!
//! Authentication is a per-call bearer token in the `Authorization` header;
//! the token travels with the webhook delivery rather than the client, so
//! the client itself holds no credentials.

pub mod client;
pub mod error;
pub mod tasks;

pub use client::{ClientConfig, ClientConfigBuilder, TaskBoardClient};
pub use error::ApiError;
pub use tasks::{CreateTaskRequest, CustomFieldFilter, CustomFieldValue, Task, TaskPage, TaskTag};
