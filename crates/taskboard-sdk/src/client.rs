//! HTTP client for the task-board API.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::tasks::{CreateTaskRequest, CustomFieldFilter, Task, TaskPage};

/// Configuration for task-board client behavior.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for API requests.
    pub user_agent: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// Task-board API base URL.
    pub api_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "taskboard-sdk/0.1.0".to_string(),
            timeout: Duration::from_secs(30),
            api_url: "https://api.clickup.com/api/v2".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Task-board API client.
///
/// Holds the HTTP connection pool and the endpoint configuration, but no
/// credentials: the bearer token is supplied per call because it arrives
/// with each webhook delivery.
#[derive(Debug, Clone)]
pub struct TaskBoardClient {
    http_client: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
}

impl TaskBoardClient {
    /// Create a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` when the base URL does not parse,
    /// and `ApiError::HttpClientError` when the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(config.api_url.trim_end_matches('/')).map_err(|e| {
                ApiError::InvalidRequest {
                    message: format!("invalid API base URL {}: {}", config.api_url, e),
                }
            })?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            config,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Search a list's open tasks by custom-field predicates.
    ///
    /// Closed tasks are excluded so that a returning lead gets a fresh task
    /// instead of reviving a finished one.
    pub async fn search_tasks(
        &self,
        token: &str,
        list_id: &str,
        filters: &[CustomFieldFilter],
    ) -> Result<TaskPage, ApiError> {
        let url = self.endpoint(&["list", list_id, "task"])?;
        let filter_json = serde_json::to_string(filters)?;

        let response = self
            .http_client
            .get(url)
            .query(&[
                ("include_closed", "false"),
                ("custom_fields", filter_json.as_str()),
            ])
            .header("Authorization", token)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.json::<TaskPage>().await?)
    }

    /// Find the first open task in a list whose custom field matches `value`.
    pub async fn find_task_by_custom_field(
        &self,
        token: &str,
        list_id: &str,
        field_id: &str,
        value: &str,
    ) -> Result<Option<Task>, ApiError> {
        let filters = [CustomFieldFilter::equals(field_id, value)];
        let page = self.search_tasks(token, list_id, &filters).await?;
        debug!(
            list_id,
            field_id,
            hits = page.tasks.len(),
            "task lookup completed"
        );
        Ok(page.tasks.into_iter().next())
    }

    /// Create a task in a list.
    pub async fn create_task(
        &self,
        token: &str,
        list_id: &str,
        request: &CreateTaskRequest,
    ) -> Result<Task, ApiError> {
        let url = self.endpoint(&["list", list_id, "task"])?;

        let response = self
            .http_client
            .post(url)
            .header("Authorization", token)
            .json(request)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let task = response.json::<Task>().await?;
        debug!(list_id, task_id = %task.id, "task created");
        Ok(task)
    }

    /// Append a tag to an existing task.
    ///
    /// The API treats this as idempotent: re-adding a tag the task already
    /// carries succeeds without duplicating it.
    pub async fn add_tag(&self, token: &str, task_id: &str, tag: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["task", task_id, "tag", tag])?;

        let response = self
            .http_client
            .post(url)
            .header("Authorization", token)
            .send()
            .await?;

        Self::check_status(response).await?;
        debug!(task_id, tag, "tag appended");
        Ok(())
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest {
                message: format!("API base URL {} cannot carry paths", self.base_url),
            })?
            .extend(segments);
        Ok(url)
    }

    /// Map non-2xx responses to the error taxonomy.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_string());

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthenticationFailed,
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimitExceeded,
            StatusCode::REQUEST_TIMEOUT => ApiError::Timeout,
            _ => ApiError::HttpError {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
