use std::sync::Mutex;

use lead_relay_core::normalize::CanonicalRecord;
use serde_json::json;

use super::*;
use crate::config::TaskboardConfig;

/// Hand-rolled store that records calls and serves canned answers.
#[derive(Default)]
struct MockStore {
    existing_task: Option<Task>,
    fail_lookup: bool,
    tagged: Mutex<Vec<(String, String)>>,
    created: Mutex<Vec<CreateTaskRequest>>,
}

#[async_trait]
impl TaskStore for MockStore {
    async fn find_task_by_email(
        &self,
        _token: &str,
        _email: &str,
    ) -> Result<Option<Task>, ApiError> {
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

fn board_config() -> TaskboardConfig {
    TaskboardConfig {
        list_id: "list-1".to_string(),
        email_field_id: "field-email".to_string(),
        phone_field_id: Some("field-phone".to_string()),
        amount_field_id: Some("field-amount".to_string()),
        ..TaskboardConfig::default()
    }
}

fn record() -> CanonicalRecord {
    CanonicalRecord {
        name: Some("Ana Souza".to_string()),
        email: Some("ana@example.com".to_string()),
        phone: Some("11999990000".to_string()),
        product: Some("bravy-club".to_string()),
        action: Some("comprador".to_string()),
        tag: Some("comprador-bravy-club".to_string()),
        product_id: Some("comprador-bravy-club".to_string()),
        amount: Some(997),
        settled_amount: None,
    }
}

fn existing_task() -> Task {
    Task {
        id: "t-1".to_string(),
        name: Some("[Lead] Ana Souza".to_string()),
        tags: Vec::new(),
        url: None,
    }
}

#[tokio::test]
async fn existing_task_gets_the_tag_appended() {
    let store = Arc::new(MockStore {
        existing_task: Some(existing_task()),
        ..MockStore::default()
    });
    let reconciler = Reconciler::new(store.clone(), board_config());

    let outcome = reconciler
        .reconcile("tok", &record(), &TaskExtras::default())
        .await
        .unwrap();

    match outcome {
        ReconcileOutcome::Tagged { task_id, tag } => {
            assert_eq!(task_id, "t-1");
            assert_eq!(tag, "comprador-bravy-club");
        }
        other => panic!("expected Tagged, got {other:?}"),
    }
    assert_eq!(
        store.tagged.lock().unwrap().as_slice(),
        &[("t-1".to_string(), "comprador-bravy-club".to_string())]
    );
    assert!(store.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_task_is_created_with_template_and_fields() {
    let store = Arc::new(MockStore::default());
    let reconciler = Reconciler::new(store.clone(), board_config());

    let outcome = reconciler
        .reconcile("tok", &record(), &TaskExtras::default())
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Created { .. }));

    let created = store.created.lock().unwrap();
    let request = &created[0];
    assert_eq!(request.name, "[Lead] Ana Souza");
    assert_eq!(request.tags, vec!["comprador-bravy-club".to_string()]);

    let fields = serde_json::to_value(&request.custom_fields).unwrap();
    assert_eq!(
        fields,
        json!([
            {"id": "field-email", "value": "ana@example.com"},
            {"id": "field-phone", "value": "11999990000"},
            {"id": "field-amount", "value": 997}
        ])
    );
}

#[tokio::test]
async fn unconfigured_and_absent_custom_fields_are_omitted() {
    let store = Arc::new(MockStore::default());
    let config = TaskboardConfig {
        list_id: "list-1".to_string(),
        email_field_id: "field-email".to_string(),
        document_field_id: Some("field-doc".to_string()),
        ..TaskboardConfig::default()
    };
    let reconciler = Reconciler::new(store.clone(), config);

    let mut record = record();
    record.phone = None;
    let extras = TaskExtras {
        payment_method: Some("PIX".to_string()), // no field id configured
        ..TaskExtras::default()
    };

    reconciler.reconcile("tok", &record, &extras).await.unwrap();

    let created = store.created.lock().unwrap();
    let ids: Vec<&str> = created[0]
        .custom_fields
        .iter()
        .map(|f| f.id.as_str())
        .collect();
    // Only the email key: document has an ID but no value, payment method
    // has a value but no ID, phone has neither.
    assert_eq!(ids, vec!["field-email"]);
}

#[tokio::test]
async fn sale_extras_flow_into_custom_fields() {
    let store = Arc::new(MockStore::default());
    let config = TaskboardConfig {
        list_id: "list-1".to_string(),
        email_field_id: "field-email".to_string(),
        document_field_id: Some("field-doc".to_string()),
        payment_method_field_id: Some("field-method".to_string()),
        payment_brand_field_id: Some("field-brand".to_string()),
        coupon_field_id: Some("field-coupon".to_string()),
        ..TaskboardConfig::default()
    };
    let reconciler = Reconciler::new(store.clone(), config);

    let extras = TaskExtras {
        document: Some("123.456.789-00".to_string()),
        payment_method: Some("PIX".to_string()),
        payment_brand: Some("visa".to_string()),
        coupon: Some("BLACK50 (percent: 50)".to_string()),
    };
    reconciler.reconcile("tok", &record(), &extras).await.unwrap();

    let created = store.created.lock().unwrap();
    let ids: Vec<&str> = created[0]
        .custom_fields
        .iter()
        .map(|f| f.id.as_str())
        .collect();
    assert_eq!(
        ids,
        vec![
            "field-email",
            "field-doc",
            "field-method",
            "field-brand",
            "field-coupon"
        ]
    );
}

#[tokio::test]
async fn record_without_name_is_rejected() {
    let reconciler = Reconciler::new(Arc::new(MockStore::default()), board_config());
    let mut record = record();
    record.name = None;

    let error = reconciler
        .reconcile("tok", &record, &TaskExtras::default())
        .await
        .unwrap_err();

    match error {
        ReconcileError::MissingFields { fields } => assert_eq!(fields, vec!["nome"]),
        other => panic!("expected MissingFields, got {other:?}"),
    }
}

#[tokio::test]
async fn record_without_tag_is_rejected() {
    let reconciler = Reconciler::new(Arc::new(MockStore::default()), board_config());
    let mut record = record();
    record.tag = None;

    let error = reconciler
        .reconcile("tok", &record, &TaskExtras::default())
        .await
        .unwrap_err();

    assert!(matches!(error, ReconcileError::MissingTag));
}

#[tokio::test]
async fn upstream_failures_propagate() {
    let store = Arc::new(MockStore {
        fail_lookup: true,
        ..MockStore::default()
    });
    let reconciler = Reconciler::new(store, board_config());

    let error = reconciler
        .reconcile("tok", &record(), &TaskExtras::default())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ReconcileError::Upstream(ApiError::HttpError { status: 503, .. })
    ));
}
