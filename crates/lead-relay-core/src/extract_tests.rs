use serde_json::json;

use super::*;
use crate::PipelineError;

#[test]
fn unwrap_envelope_returns_bare_object_unchanged() {
    let raw = json!({"type": "sale", "event": "saleUpdated"});
    let unwrapped = unwrap_envelope(&raw).unwrap();
    assert_eq!(unwrapped.get("type"), Some(&json!("sale")));
}

#[test]
fn unwrap_envelope_extracts_body_from_forwarder_array() {
    let raw = json!([{
        "headers": {"x-webhook-token": "tok-123"},
        "body": {"type": "lead", "event": "checkoutAbandoned"}
    }]);
    let unwrapped = unwrap_envelope(&raw).unwrap();
    assert_eq!(unwrapped.get("event"), Some(&json!("checkoutAbandoned")));
}

#[test]
fn unwrap_envelope_uses_first_element_when_no_body_key() {
    let raw = json!([{"type": "sale", "client": {"email": "a@b.c"}}]);
    let unwrapped = unwrap_envelope(&raw).unwrap();
    assert_eq!(unwrapped.get("type"), Some(&json!("sale")));
}

#[test]
fn unwrap_envelope_rejects_empty_array() {
    let raw = json!([]);
    let error = unwrap_envelope(&raw).unwrap_err();
    assert!(matches!(error, PipelineError::InvalidPayload { .. }));
}

#[test]
fn unwrap_envelope_rejects_scalars() {
    for raw in [json!("sale"), json!(42), json!(true), json!(null)] {
        assert!(unwrap_envelope(&raw).is_err(), "accepted scalar {raw}");
    }
}

#[test]
fn unwrap_envelope_rejects_non_object_body() {
    let raw = json!([{"body": "not an object"}]);
    assert!(unwrap_envelope(&raw).is_err());
}

#[test]
fn resolve_returns_first_matching_path() {
    let data = json!({"client": {"name": "Ana"}, "nome": "shadowed"});
    let paths: FieldPathSet = &[&["client", "name"], &["nome"]];
    assert_eq!(resolve(&data, paths), Some(&json!("Ana")));
}

#[test]
fn resolve_falls_through_to_later_paths() {
    let data = json!({"nome": "Ana"});
    let paths: FieldPathSet = &[&["client", "name"], &["nome"]];
    assert_eq!(resolve(&data, paths), Some(&json!("Ana")));
}

#[test]
fn resolve_treats_explicit_null_as_absence() {
    let data = json!({"client": {"name": null}, "nome": "Ana"});
    let paths: FieldPathSet = &[&["client", "name"], &["nome"]];
    assert_eq!(resolve(&data, paths), Some(&json!("Ana")));
}

#[test]
fn resolve_aborts_path_on_non_object_intermediate() {
    // `client` is a string, so `client.name` cannot be traversed.
    let data = json!({"client": "Ana", "nome": "fallback"});
    let paths: FieldPathSet = &[&["client", "name"], &["nome"]];
    assert_eq!(resolve(&data, paths), Some(&json!("fallback")));
}

#[test]
fn resolve_returns_empty_string_as_a_hit() {
    let data = json!({"client": {"name": ""}, "nome": "Ana"});
    let paths: FieldPathSet = &[&["client", "name"], &["nome"]];
    assert_eq!(resolve(&data, paths), Some(&json!("")));
}

#[test]
fn resolve_yields_none_when_no_path_matches() {
    let data = json!({"other": 1});
    let paths: FieldPathSet = &[&["client", "name"], &["nome"]];
    assert_eq!(resolve(&data, paths), None);
}

#[test]
fn envelope_token_reads_forwarded_header() {
    let raw = json!([{
        "headers": {"x-webhook-token": "tok-123"},
        "body": {}
    }]);
    assert_eq!(envelope_token(&raw), Some("tok-123"));
}

#[test]
fn envelope_token_absent_for_bare_objects() {
    let raw = json!({"type": "sale"});
    assert_eq!(envelope_token(&raw), None);
}

#[test]
fn envelope_token_absent_when_headers_missing() {
    let raw = json!([{"body": {"type": "sale"}}]);
    assert_eq!(envelope_token(&raw), None);
}
