//! # Lead-Relay HTTP Service
//!
//! HTTP server for receiving checkout-platform webhooks, normalizing them
//! into canonical lead records, and reconciling leads against the external
//! task board.
//!
//! Endpoints:
//! - `POST /webhook/lead`: pure normalization, returns the canonical record
//! - `POST /webhook/task`: validation plus task-board reconciliation
//! - `GET /health`: liveness check

pub mod config;
pub mod reconcile;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use lead_relay_core::event::{
    validate_abandonment, validate_contract, validate_sale, WebhookKind,
};
use lead_relay_core::extract::envelope_token;
use lead_relay_core::{
    unwrap_envelope, CanonicalRecord, Normalizer, PipelineError, ValidationError,
};
use serde::Serialize;
use serde_json::Value;
use taskboard_sdk::Task;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

pub use config::{ConfigError, ServiceConfig};
pub use reconcile::{ReconcileError, ReconcileOutcome, Reconciler, SdkTaskStore, TaskStore};

use reconcile::TaskExtras;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Field-extraction pipeline
    pub normalizer: Arc<Normalizer>,

    /// Task-board reconciliation orchestrator
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, reconciler: Arc<Reconciler>) -> Self {
        let normalizer = Arc::new(Normalizer::new(config.normalizer.to_normalizer_config()));
        Self {
            config,
            normalizer,
            reconciler,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route("/webhook/lead", post(handle_normalize))
        .route("/webhook/task", post(handle_task));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    reconciler: Arc<Reconciler>,
) -> Result<(), ServiceError> {
    config.validate()?;

    let shutdown_timeout =
        std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);
    let port = config.server.port;

    let state = AppState::new(config, reconciler);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle pure-normalization requests.
///
/// Accepts any envelope shape, runs the extraction pipeline, and returns
/// the canonical record wrapped in a single-element array (the contract
/// expected by the downstream marketing automation). Unresolvable fields
/// come back null; only an unusable envelope is an error.
#[instrument(skip(state, body))]
pub async fn handle_normalize(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<CanonicalRecord>>, HandlerError> {
    let raw = parse_body(&body)?;
    let payload = unwrap_envelope(&raw)?;
    let record = state.normalizer.normalize(payload);

    info!(
        email = record.email.as_deref().unwrap_or("<none>"),
        tag = record.tag.as_deref().unwrap_or("<none>"),
        "normalized webhook delivery"
    );

    Ok(Json(vec![record]))
}

/// Handle task-reconciliation requests.
///
/// Strict counterpart of [`handle_normalize`]: the delivery must carry a
/// credential, classify to a known type/event pairing, pass the per-kind
/// validations, and normalize to a record with name, email and tag. The
/// record is then reconciled against the task board.
#[instrument(skip(state, headers, body))]
pub async fn handle_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HandlerError> {
    let raw = parse_body(&body)?;

    // An unusable envelope is rejected before the credential is consulted.
    let payload = unwrap_envelope(&raw)?;
    let token = resolve_token(&state, &headers, &raw).ok_or(HandlerError::Unauthorized)?;

    let kind = WebhookKind::classify(payload)?;

    let (extras, status) = match kind {
        WebhookKind::Sale => {
            let details = validate_sale(payload)?;
            (
                TaskExtras {
                    document: details.document,
                    payment_method: details.payment_method,
                    payment_brand: details.payment_brand,
                    coupon: details.coupon,
                },
                details.current_status,
            )
        }
        WebhookKind::Contract => {
            let details = validate_contract(payload)?;
            (
                TaskExtras {
                    document: details.document,
                    coupon: details.coupon,
                    ..TaskExtras::default()
                },
                details.current_status,
            )
        }
        WebhookKind::CheckoutAbandoned => {
            validate_abandonment(payload)?;
            (TaskExtras::default(), "abandoned".to_string())
        }
    };

    let record = state.normalizer.normalize(payload);
    if record.tag.is_none() {
        return Err(HandlerError::Validation(ValidationError::UnresolvableTag));
    }

    let outcome = state.reconciler.reconcile(&token, &record, &extras).await?;

    let webhook_type = kind.webhook_type().as_str().to_string();
    let event = kind.event().as_str().to_string();
    let email = record.email.clone().unwrap_or_default();

    let response = match outcome {
        ReconcileOutcome::Tagged { task_id, tag } => {
            let body = TaskWebhookResponse {
                message: "tag appended to existing task".to_string(),
                task_id: Some(task_id),
                task: None,
                tag,
                email,
                webhook_type,
                event,
                status,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        ReconcileOutcome::Created { task, tag } => {
            let body = TaskWebhookResponse {
                message: "task created".to_string(),
                task_id: None,
                task: Some(task),
                tag,
                email,
                webhook_type,
                event,
                status,
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
    };

    Ok(response)
}

/// Parse the request body as JSON.
fn parse_body(body: &Bytes) -> Result<Value, HandlerError> {
    serde_json::from_slice(body).map_err(|e| {
        HandlerError::InvalidPayload(PipelineError::InvalidPayload {
            message: format!("request body is not valid JSON: {}", e),
        })
    })
}

/// Resolve the task-board credential for a delivery.
///
/// Precedence: `Authorization` header, `X-Webhook-Token` header, the token
/// forwarded inside an array envelope, then the configured fallback.
fn resolve_token(state: &AppState, headers: &HeaderMap, raw: &Value) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("x-webhook-token")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .or_else(|| envelope_token(raw).map(str::to_string))
        .or_else(|| state.config.taskboard.api_token.clone())
}

// ============================================================================
// Health Check Handler
// ============================================================================

/// Basic health check endpoint
#[instrument]
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Extracts or generates a correlation ID, logs request start and
/// completion with structured fields, and propagates the ID through the
/// response headers.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Task-reconciliation response.
///
/// `task_id` is set when an existing task was tagged, `task` when a new
/// one was created.
#[derive(Debug, Serialize)]
pub struct TaskWebhookResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    pub tag: String,
    pub email: String,
    #[serde(rename = "type")]
    pub webhook_type: String,
    pub event: String,
    pub status: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

// ============================================================================
// Error Types
// ============================================================================

/// Webhook handler errors with HTTP status code mapping.
///
/// - `400 Bad Request`: malformed envelopes and failed validations
/// - `401 Unauthorized`: no task-board credential could be resolved
/// - `500 Internal Server Error`: task-board operations failed; the
///   upstream error text is propagated so redeliveries can be diagnosed
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// No credential in the headers, the envelope, or the configuration.
    #[error("missing task-board credential")]
    Unauthorized,

    /// The envelope is malformed or does not contain a JSON object.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PipelineError),

    /// Classification or an enumerated-value validation failed.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Reconciliation against the task board failed.
    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::InvalidPayload(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Reconcile(error) => match error {
                ReconcileError::MissingFields { .. } | ReconcileError::MissingTag => {
                    (StatusCode::BAD_REQUEST, self.to_string())
                }
                ReconcileError::Upstream(upstream) => {
                    error!(error = %upstream, "task-board operation failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
                }
            },
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
