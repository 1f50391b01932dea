use std::sync::Mutex;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use taskboard_sdk::{ApiError, CreateTaskRequest};
use tower::ServiceExt;

use super::*;
use crate::config::TaskboardConfig;

#[derive(Default)]
struct MockStore {
    existing_task: Option<Task>,
    fail_lookup: bool,
    tagged: Mutex<Vec<(String, String)>>,
    created: Mutex<Vec<CreateTaskRequest>>,
    tokens_seen: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl TaskStore for MockStore {
    async fn find_task_by_email(
        &self,
        token: &str,
        _email: &str,
    ) -> Result<Option<Task>, ApiError> {
        self.tokens_seen.lock().unwrap().push(token.to_string());
        if self.fail_lookup {
            return Err(ApiError::HttpError {
                status: 503,
                message: "maintenance".to_string(),
            });
        }
        Ok(self.existing_task.clone())
    }

    async fn create_task(
        &self,
        _token: &str,
        request: &CreateTaskRequest,
    ) -> Result<Task, ApiError> {
        self.created.lock().unwrap().push(request.clone());
        Ok(Task {
            id: "t-new".to_string(),
            name: Some(request.name.clone()),
            tags: Vec::new(),
            url: None,
        })
    }

    async fn add_tag(&self, _token: &str, task_id: &str, tag: &str) -> Result<(), ApiError> {
        self.tagged
            .lock()
            .unwrap()
            .push((task_id.to_string(), tag.to_string()));
        Ok(())
    }
}

fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.taskboard = TaskboardConfig {
        list_id: "list-1".to_string(),
        email_field_id: "field-email".to_string(),
        ..TaskboardConfig::default()
    };
    config
}

fn app(store: Arc<MockStore>) -> Router {
    app_with_config(store, test_config())
}

fn app_with_config(store: Arc<MockStore>, config: ServiceConfig) -> Router {
    let reconciler = Arc::new(Reconciler::new(store, config.taskboard.clone()));
    create_router(AppState::new(config, reconciler))
}

async fn response_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn sale_payload() -> Value {
    json!({
        "type": "sale",
        "event": "saleUpdated",
        "currentStatus": "paid",
        "client": {
            "name": "Ana Souza",
            "email": "ana@example.com",
            "cellphone": "11999990000"
        },
        "product": {"name": "Bravy Club"},
        "sale": {"status": "paid", "amount": "997,00"}
    })
}

// ----------------------------------------------------------------------------
// Health
// ----------------------------------------------------------------------------

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let response = app(Arc::new(MockStore::default()))
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], json!("healthy"));
}

// ----------------------------------------------------------------------------
// Normalization endpoint
// ----------------------------------------------------------------------------

#[tokio::test]
async fn normalize_returns_single_element_array() {
    let response = app(Arc::new(MockStore::default()))
        .oneshot(post("/webhook/lead", sale_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["nome"], json!("Ana Souza"));
    assert_eq!(body[0]["tag"], json!("comprador-bravy-club"));
    assert_eq!(body[0]["valor"], json!(997));
}

#[tokio::test]
async fn normalize_tolerates_unresolvable_fields() {
    let response = app(Arc::new(MockStore::default()))
        .oneshot(post("/webhook/lead", json!({"unrelated": true})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body[0]["nome"], Value::Null);
    assert_eq!(body[0]["tag"], Value::Null);
}

#[tokio::test]
async fn normalize_unwraps_forwarder_envelopes() {
    let envelope = json!([{
        "headers": {"x-webhook-token": "tok"},
        "body": sale_payload()
    }]);
    let response = app(Arc::new(MockStore::default()))
        .oneshot(post("/webhook/lead", envelope))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body[0]["email"], json!("ana@example.com"));
}

#[tokio::test]
async fn normalize_rejects_malformed_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/lead")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(Arc::new(MockStore::default()))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn normalize_rejects_scalar_envelope() {
    let response = app(Arc::new(MockStore::default()))
        .oneshot(post("/webhook/lead", json!("just a string")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ----------------------------------------------------------------------------
// Task endpoint: credentials
// ----------------------------------------------------------------------------

#[tokio::test]
async fn task_without_any_credential_is_unauthorized() {
    let response = app(Arc::new(MockStore::default()))
        .oneshot(post("/webhook/task", sale_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn task_rejects_empty_envelope_before_checking_credentials() {
    let response = app(Arc::new(MockStore::default()))
        .oneshot(post("/webhook/task", json!([])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_uses_authorization_header_token() {
    let store = Arc::new(MockStore::default());
    let mut request = post("/webhook/task", sale_payload());
    request
        .headers_mut()
        .insert("authorization", "tok-header".parse().unwrap());

    let response = app(store.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        store.tokens_seen.lock().unwrap().as_slice(),
        &["tok-header".to_string()]
    );
}

#[tokio::test]
async fn task_falls_back_to_envelope_token() {
    let store = Arc::new(MockStore::default());
    let envelope = json!([{
        "headers": {"x-webhook-token": "tok-envelope"},
        "body": sale_payload()
    }]);

    let response = app(store.clone())
        .oneshot(post("/webhook/task", envelope))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        store.tokens_seen.lock().unwrap().as_slice(),
        &["tok-envelope".to_string()]
    );
}

#[tokio::test]
async fn task_falls_back_to_configured_token() {
    let store = Arc::new(MockStore::default());
    let mut config = test_config();
    config.taskboard.api_token = Some("tok-config".to_string());

    let response = app_with_config(store.clone(), config)
        .oneshot(post("/webhook/task", sale_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        store.tokens_seen.lock().unwrap().as_slice(),
        &["tok-config".to_string()]
    );
}

// ----------------------------------------------------------------------------
// Task endpoint: reconciliation outcomes
// ----------------------------------------------------------------------------

fn authorized(mut request: Request<Body>) -> Request<Body> {
    request
        .headers_mut()
        .insert("authorization", "tok".parse().unwrap());
    request
}

#[tokio::test]
async fn task_tags_existing_lead() {
    let store = Arc::new(MockStore {
        existing_task: Some(Task {
            id: "t-1".to_string(),
            name: Some("[Lead] Ana Souza".to_string()),
            tags: Vec::new(),
            url: None,
        }),
        ..MockStore::default()
    });

    let response = app(store.clone())
        .oneshot(authorized(post("/webhook/task", sale_payload())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["task_id"], json!("t-1"));
    assert_eq!(body["tag"], json!("comprador-bravy-club"));
    assert_eq!(body["email"], json!("ana@example.com"));
    assert_eq!(body["type"], json!("sale"));
    assert_eq!(body["event"], json!("saleUpdated"));
    assert_eq!(body["status"], json!("paid"));
    assert_eq!(
        store.tagged.lock().unwrap().as_slice(),
        &[("t-1".to_string(), "comprador-bravy-club".to_string())]
    );
}

#[tokio::test]
async fn task_creates_lead_when_missing() {
    let store = Arc::new(MockStore::default());

    let response = app(store.clone())
        .oneshot(authorized(post("/webhook/task", sale_payload())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["task"]["id"], json!("t-new"));
    assert_eq!(body["task"]["name"], json!("[Lead] Ana Souza"));
    assert_eq!(body["tag"], json!("comprador-bravy-club"));
    assert!(body.get("task_id").is_none());
}

#[tokio::test]
async fn abandonment_creates_task_with_abandoned_status() {
    let store = Arc::new(MockStore::default());
    let payload = json!({
        "type": "lead",
        "event": "checkoutAbandoned",
        "lead": {
            "name": "Ana Souza",
            "email": "ana@example.com",
            "step": 2
        },
        "product": {"name": "Floow PRO"}
    });

    let response = app(store.clone())
        .oneshot(authorized(post("/webhook/task", payload)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["tag"], json!("abandonada-floow-pro"));
    assert_eq!(body["type"], json!("lead"));
    assert_eq!(body["status"], json!("abandoned"));
}

// ----------------------------------------------------------------------------
// Task endpoint: validation failures
// ----------------------------------------------------------------------------

#[tokio::test]
async fn task_rejects_unknown_webhook_type() {
    let mut payload = sale_payload();
    payload["type"] = json!("refund");

    let response = app(Arc::new(MockStore::default()))
        .oneshot(authorized(post("/webhook/task", payload)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_rejects_mismatched_pairing() {
    let mut payload = sale_payload();
    payload["event"] = json!("checkoutAbandoned");

    let response = app(Arc::new(MockStore::default()))
        .oneshot(authorized(post("/webhook/task", payload)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_rejects_invalid_status() {
    let mut payload = sale_payload();
    payload["currentStatus"] = json!("mystery");

    let response = app(Arc::new(MockStore::default()))
        .oneshot(authorized(post("/webhook/task", payload)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_rejects_record_without_email() {
    let mut payload = sale_payload();
    payload["client"]
        .as_object_mut()
        .unwrap()
        .remove("email");

    let response = app(Arc::new(MockStore::default()))
        .oneshot(authorized(post("/webhook/task", payload)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn task_rejects_underivable_tag() {
    let mut payload = sale_payload();
    payload.as_object_mut().unwrap().remove("product");

    let response = app(Arc::new(MockStore::default()))
        .oneshot(authorized(post("/webhook/task", payload)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_maps_upstream_failure_to_internal_error() {
    let store = Arc::new(MockStore {
        fail_lookup: true,
        ..MockStore::default()
    });

    let response = app(store)
        .oneshot(authorized(post("/webhook/task", sale_payload())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("503"));
}
